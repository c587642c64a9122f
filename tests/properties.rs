use proptest::prelude::*;
use shelltool::sandbox::profiles::{appcontainer, bwrap, seatbelt};
use shelltool::{SandboxPolicy, Termination};

/// Reference split of a command line by the `CommandLineToArgvW` rules.
fn split_windows_args(line: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut chars = line.chars().peekable();
    loop {
        while matches!(chars.peek(), Some(' ') | Some('\t')) {
            chars.next();
        }
        if chars.peek().is_none() {
            break;
        }
        let mut arg = String::new();
        let mut quoted = false;
        let mut backslashes = 0usize;
        while let Some(&c) = chars.peek() {
            match c {
                '\\' => {
                    backslashes += 1;
                    chars.next();
                }
                '"' => {
                    arg.extend(std::iter::repeat('\\').take(backslashes / 2));
                    if backslashes % 2 == 1 {
                        arg.push('"');
                    } else {
                        quoted = !quoted;
                    }
                    backslashes = 0;
                    chars.next();
                }
                ' ' | '\t' if !quoted => break,
                _ => {
                    arg.extend(std::iter::repeat('\\').take(backslashes));
                    backslashes = 0;
                    arg.push(c);
                    chars.next();
                }
            }
        }
        arg.extend(std::iter::repeat('\\').take(backslashes));
        args.push(arg);
    }
    args
}

proptest! {
    #[test]
    fn test_bwrap_script_is_always_the_last_argument(
        script in "\\PC*",
        allow_network in any::<bool>(),
    ) {
        let policy = SandboxPolicy::new().allow_network(allow_network);
        let args = bwrap::command_args(&policy, "bash", &script);
        prop_assert_eq!(args.last().unwrap(), &script);
        // Script text never lands among the sandbox flags
        let sep = args.iter().position(|a| a == "--").unwrap();
        prop_assert_eq!(sep, args.len() - 4);
        prop_assert_eq!(args[..sep].iter().any(|a| a == "--unshare-net"), !allow_network);
    }

    #[test]
    fn test_seatbelt_profile_shape(
        dirs in proptest::collection::vec("/[a-zA-Z0-9 ._\"\\\\-]{1,40}", 0..4),
        allow_network in any::<bool>(),
    ) {
        let policy = SandboxPolicy::new().allow_network(allow_network);
        let text = seatbelt::profile(&policy, &dirs);
        prop_assert!(text.starts_with("(version 1)"));
        prop_assert_eq!(text.matches("(allow file-write* (subpath ").count(), dirs.len());
        prop_assert_eq!(text.contains("(deny network*)"), !allow_network);
        prop_assert_eq!(text.contains("(allow network*)"), allow_network);
        // Quoting keeps every rule on one balanced line
        for line in text.lines().filter(|l| l.starts_with('(')) {
            let unescaped_quotes = line
                .char_indices()
                .filter(|&(i, c)| c == '"' && !is_escaped(line, i))
                .count();
            prop_assert_eq!(unescaped_quotes % 2, 0, "{}", line);
        }
    }

    #[test]
    fn test_windows_quoting_round_trips(arg in "[a-zA-Z0-9 \\\\\"._:-]{0,30}") {
        let quoted = appcontainer::quote_arg(&arg, false);
        prop_assert_eq!(split_windows_args(&quoted), vec![arg.clone()]);
        let forced = appcontainer::quote_arg(&arg, true);
        prop_assert_eq!(split_windows_args(&forced), vec![arg]);
    }

    #[test]
    fn test_powershell_command_line_keeps_paths_intact(
        dir in "[A-Z]:\\\\[a-zA-Z0-9 ._-]{1,20}",
    ) {
        let script = format!("{}\\shelltool.x.ps1", dir);
        let line = appcontainer::command_line("C:\\Windows\\powershell.exe", &script);
        let args = split_windows_args(&line);
        prop_assert_eq!(&args[0], "C:\\Windows\\powershell.exe");
        prop_assert_eq!(args.last().unwrap(), &script);
        prop_assert_eq!(&args[args.len() - 2], "-File");
    }

    #[test]
    fn test_environment_block_layout(
        vars in proptest::collection::vec(("[A-Z_]{1,8}", "[a-z0-9 ]{0,8}"), 1..6),
    ) {
        let vars: Vec<(String, String)> = vars;
        let block = appcontainer::environment_block(&vars);
        prop_assert_eq!(block.iter().filter(|&&u| u == 0).count(), vars.len() + 1);
        prop_assert_eq!(&block[block.len() - 2..], &[0u16, 0u16][..]);
    }

    #[test]
    fn test_exit_code_display(code in any::<i32>()) {
        let text = Termination::Exited(code).to_string();
        if (0..=255).contains(&code) {
            prop_assert_eq!(text, format!("exit code {}", code));
        } else {
            prop_assert!(text.starts_with("exit code 0x"));
            prop_assert_eq!(text.len(), "exit code 0x".len() + 8);
        }
    }
}

fn is_escaped(line: &str, idx: usize) -> bool {
    line[..idx].chars().rev().take_while(|&c| c == '\\').count() % 2 == 1
}
