//! Property-based tests for command construction and shell quoting

use std::path::Path;

use benchrig_core::command::{self, ELEVATE_PREFIX, LOCAL_SHELL, SSH_PROGRAM};
use benchrig_core::{Target, is_local_host, shell_join, shell_quote};
use proptest::prelude::*;

/// Reads back one word produced by `shell_quote`: bare characters, single
/// quoted spans and double quoted spans (which only ever hold `'`)
fn unquote(word: &str) -> String {
    let mut out = String::new();
    let mut chars = word.chars();
    while let Some(c) = chars.next() {
        match c {
            '\'' => out.extend(chars.by_ref().take_while(|&c| c != '\'')),
            '"' => out.extend(chars.by_ref().take_while(|&c| c != '"')),
            other => out.push(other),
        }
    }
    out
}

// ========== Strategies ==========

/// Tokens containing anything, including quotes and whitespace
fn arb_token() -> impl Strategy<Value = String> {
    prop_oneof![
        any::<String>(),
        "[a-zA-Z0-9 '\"$`\\\\;&|*?]{0,24}",
        Just(String::new()),
        Just("'".to_string()),
    ]
}

fn arb_safe_token() -> impl Strategy<Value = String> {
    "[A-Za-z0-9@%+=:,./_-]{1,32}"
}

fn arb_local_alias() -> impl Strategy<Value = String> {
    (
        prop_oneof![
            Just(""),
            Just("local"),
            Just("localhost"),
            Just("127.0.0.1"),
            Just("::1"),
        ],
        " {0,3}",
        " {0,3}",
    )
        .prop_map(|(alias, pre, post)| format!("{pre}{alias}{post}"))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Any token survives quoting and unquoting unchanged
    #[test]
    fn quote_round_trips(token in arb_token()) {
        prop_assert_eq!(unquote(&shell_quote(&token)), token);
    }

    /// Safe tokens are never quoted
    #[test]
    fn safe_tokens_stay_bare(token in arb_safe_token()) {
        prop_assert_eq!(shell_quote(&token), token);
    }

    /// A quoted token never contains an unquoted space
    #[test]
    fn quoted_token_is_one_word(token in arb_token()) {
        let quoted = shell_quote(&token);
        let mut in_single = false;
        let mut in_double = false;
        for c in quoted.chars() {
            match c {
                '\'' if !in_double => in_single = !in_single,
                '"' if !in_single => in_double = !in_double,
                c if c.is_whitespace() => prop_assert!(in_single || in_double),
                _ => {}
            }
        }
    }

    /// Joined tokens split back into the same number of words
    #[test]
    fn join_preserves_word_count(tokens in prop::collection::vec(arb_safe_token(), 0..8)) {
        let joined = shell_join(&tokens);
        prop_assert_eq!(joined.split(' ').filter(|w| !w.is_empty()).count(), tokens.len());
    }

    /// Every local alias, with surrounding whitespace, resolves locally
    #[test]
    fn local_aliases_are_local(alias in arb_local_alias()) {
        prop_assert!(is_local_host(&alias));
        let cmd = command::build(&Target::new(alias), Path::new("/w"), &[]);
        prop_assert_eq!(cmd.program(), LOCAL_SHELL);
    }

    /// Remote targets go through ssh and carry the fragment as the last token
    #[test]
    fn remote_targets_use_ssh(
        octet in 1u8..=254,
        port in 1u16..,
        elevate in any::<bool>(),
        args in prop::collection::vec(arb_token(), 0..5),
    ) {
        let target = Target::new(format!("10.77.0.{octet}"))
            .with_user("bench")
            .with_port(port)
            .with_elevate(elevate);
        let mut argv = vec!["./build_dpu/relay".to_string()];
        argv.extend(args);

        let cmd = command::build(&target, Path::new("/opt/work dir"), &argv);
        prop_assert_eq!(cmd.program(), SSH_PROGRAM);
        let port_string = port.to_string();
        prop_assert!(cmd.argv().windows(2).any(|w| w[0] == "-p" && w[1] == port_string));

        let fragment = cmd.argv().last().cloned().unwrap_or_default();
        prop_assert!(fragment.starts_with("cd '/opt/work dir' && exec "));
        let elevated = format!("exec {}", ELEVATE_PREFIX.join(" "));
        prop_assert_eq!(fragment.contains(&elevated), elevate);
    }
}
