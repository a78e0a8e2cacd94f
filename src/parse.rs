//! Msh line parser.
//!
//! Turns one raw input line into a [`ParsedJob`]: an argument vector per
//! pipeline stage, each stage's redirections, and a background flag. Tokens
//! are whitespace-delimited; quoting, expansion and globbing are not part of
//! the grammar.

use crate::errors::{Error, Result};

/// Where a command's standard streams are rebound, if anywhere.
///
/// A redirection operator with a missing target is a syntax error caught
/// here, before any file is opened.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Redirects {
    /// `< file`
    pub stdin: Option<String>,
    /// `> file` or `>> file`
    pub stdout: Option<OutputRedirect>,
    /// `2> file`
    pub stderr: Option<String>,
}

/// Target of a `>` or `>>` redirection.
#[derive(Clone, Debug, PartialEq)]
pub struct OutputRedirect {
    pub filename: String,
    pub append: bool,
}

/// A single program invocation: argv plus its redirection plan.
#[derive(Clone, Debug, PartialEq)]
pub struct SimpleCommand {
    /// The program to execute (argv[0]).
    pub program: String,
    /// The remaining arguments to the program.
    pub args: Vec<String>,
    pub redirects: Redirects,
}

/// One parsed line: a single command, or exactly one two-stage pipeline.
///
/// Only one pipe is recognized; a second `|` is passed through to the
/// right-hand command's argv. Known limitation, kept to match the modeled
/// behavior.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Simple(SimpleCommand),
    Pipeline(SimpleCommand, SimpleCommand),
}

/// Represents all information associated with a user input line.
#[derive(Clone, Debug, PartialEq)]
pub struct ParsedJob {
    /// Trimmed command line, used for messages and history.
    pub input: String,
    /// Run the job in the background, defaults to false.
    pub background: bool,
    pub command: Command,
}

impl ParsedJob {
    /// Parses an input string into a `ParsedJob`.
    ///
    /// Returns `Ok(None)` for a blank line.
    ///
    /// # Examples
    ///
    /// ```
    /// use msh::parse::{Command, ParsedJob};
    ///
    /// let job = ParsedJob::parse("echo test &").unwrap().unwrap();
    /// assert_eq!(job.input, "echo test &");
    /// assert!(job.background);
    ///
    /// match job.command {
    ///     Command::Simple(ref command) => {
    ///         assert_eq!(command.program, "echo");
    ///         assert_eq!(command.args, vec!["test".to_string()]);
    ///     }
    ///     _ => panic!("expected a simple command"),
    /// }
    /// ```
    pub fn parse(input: &str) -> Result<Option<ParsedJob>> {
        let input_trimmed = input.trim();
        let (tokens, background) = tokenize(input_trimmed);
        if tokens.is_empty() {
            return Ok(None);
        }

        let (left, right) = split_pipeline(input_trimmed, tokens)?;
        let command = match right {
            Some(right) => Command::Pipeline(
                extract_redirects(input_trimmed, left)?,
                extract_redirects(input_trimmed, right)?,
            ),
            None => Command::Simple(extract_redirects(input_trimmed, left)?),
        };

        Ok(Some(ParsedJob {
            input: input_trimmed.to_owned(),
            background,
            command,
        }))
    }
}

/// Splits a line into whitespace-delimited tokens and a background flag.
///
/// A trailing `&` sets the flag and is excluded from the token list.
pub fn tokenize(input: &str) -> (Vec<String>, bool) {
    let mut tokens: Vec<String> = input.split_whitespace().map(str::to_owned).collect();
    let background = tokens.last().map_or(false, |token| token == "&");
    if background {
        tokens.pop();
    }
    (tokens, background)
}

/// Splits the token stream at the first `|`. Either side being empty is a
/// syntax error.
fn split_pipeline(input: &str, mut tokens: Vec<String>) -> Result<(Vec<String>, Option<Vec<String>>)> {
    match tokens.iter().position(|token| token == "|") {
        Some(index) => {
            let right = tokens.split_off(index + 1);
            tokens.pop(); // the pipe token itself
            if tokens.is_empty() || right.is_empty() {
                return Err(Error::syntax(input));
            }
            Ok((tokens, Some(right)))
        }
        None => Ok((tokens, None)),
    }
}

/// Consumes redirection operator/target pairs out of a token stream, leaving
/// the program and its arguments.
fn extract_redirects(input: &str, tokens: Vec<String>) -> Result<SimpleCommand> {
    let mut argv = Vec::new();
    let mut redirects = Redirects::default();

    let mut iter = tokens.into_iter();
    while let Some(token) = iter.next() {
        match token.as_str() {
            "<" => redirects.stdin = Some(redirect_target(input, iter.next())?),
            ">" => {
                redirects.stdout = Some(OutputRedirect {
                    filename: redirect_target(input, iter.next())?,
                    append: false,
                })
            }
            ">>" => {
                redirects.stdout = Some(OutputRedirect {
                    filename: redirect_target(input, iter.next())?,
                    append: true,
                })
            }
            "2>" => redirects.stderr = Some(redirect_target(input, iter.next())?),
            _ => argv.push(token),
        }
    }

    let mut argv = argv.into_iter();
    match argv.next() {
        Some(program) => Ok(SimpleCommand {
            program,
            args: argv.collect(),
            redirects,
        }),
        None => Err(Error::syntax(input)),
    }
}

fn redirect_target(input: &str, token: Option<String>) -> Result<String> {
    token.ok_or_else(|| Error::syntax(input))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_simple(input: &str) -> SimpleCommand {
        match ParsedJob::parse(input).unwrap().unwrap().command {
            Command::Simple(command) => command,
            command => panic!("expected simple command, got {:?}", command),
        }
    }

    #[test]
    fn empty() {
        assert!(ParsedJob::parse("").unwrap().is_none());
        assert!(ParsedJob::parse("   \t ").unwrap().is_none());
    }

    #[test]
    fn single_cmd() {
        let command = parse_simple("cmd");
        assert_eq!(command.program, "cmd");
        assert!(command.args.is_empty());
        assert_eq!(command.redirects, Redirects::default());
    }

    #[test]
    fn single_cmd_with_args() {
        let command = parse_simple("cmd var1 var2 var3");
        assert_eq!(command.program, "cmd");
        assert_eq!(command.args, vec!["var1", "var2", "var3"]);
    }

    #[test]
    fn token_count_matches_input() {
        let command = parse_simple("cmd a b c d e");
        assert_eq!(command.args.len(), 5);
    }

    #[test]
    fn background() {
        let job = ParsedJob::parse("sleep 10 &").unwrap().unwrap();
        assert!(job.background);
        match job.command {
            Command::Simple(command) => assert_eq!(command.args, vec!["10"]),
            command => panic!("expected simple command, got {:?}", command),
        }
    }

    #[test]
    fn foreground_by_default() {
        assert!(!ParsedJob::parse("cmd").unwrap().unwrap().background);
    }

    #[test]
    fn infile_valid() {
        let command = parse_simple("cmd < infile");
        assert_eq!(command.redirects.stdin.as_deref(), Some("infile"));
        assert!(command.args.is_empty());
    }

    #[test]
    fn infile_invalid() {
        assert!(ParsedJob::parse("cmd <").is_err());
    }

    #[test]
    fn outfile_valid() {
        let command = parse_simple("cmd > outfile");
        assert_eq!(
            command.redirects.stdout,
            Some(OutputRedirect {
                filename: "outfile".to_string(),
                append: false,
            })
        );
    }

    #[test]
    fn outfile_append() {
        let command = parse_simple("cmd >> outfile");
        assert_eq!(
            command.redirects.stdout,
            Some(OutputRedirect {
                filename: "outfile".to_string(),
                append: true,
            })
        );
    }

    #[test]
    fn outfile_invalid() {
        assert!(ParsedJob::parse("cmd >").is_err());
        assert!(ParsedJob::parse("cmd >>").is_err());
    }

    #[test]
    fn errfile_valid() {
        let command = parse_simple("cmd 2> errfile");
        assert_eq!(command.redirects.stderr.as_deref(), Some("errfile"));
    }

    #[test]
    fn errfile_invalid() {
        assert!(ParsedJob::parse("cmd 2>").is_err());
    }

    #[test]
    fn combined_in_out() {
        let command = parse_simple("cmd < infile > outfile");
        assert_eq!(command.redirects.stdin.as_deref(), Some("infile"));
        assert_eq!(
            command.redirects.stdout,
            Some(OutputRedirect {
                filename: "outfile".to_string(),
                append: false,
            })
        );
        assert!(command.args.is_empty());
    }

    #[test]
    fn pipeline_valid() {
        let job = ParsedJob::parse("ls -l | grep needle").unwrap().unwrap();
        match job.command {
            Command::Pipeline(left, right) => {
                assert_eq!(left.program, "ls");
                assert_eq!(left.args, vec!["-l"]);
                assert_eq!(right.program, "grep");
                assert_eq!(right.args, vec!["needle"]);
            }
            command => panic!("expected pipeline, got {:?}", command),
        }
    }

    #[test]
    fn pipeline_with_redirects() {
        let job = ParsedJob::parse("sort < in.txt | uniq > out.txt")
            .unwrap()
            .unwrap();
        match job.command {
            Command::Pipeline(left, right) => {
                assert_eq!(left.redirects.stdin.as_deref(), Some("in.txt"));
                assert_eq!(
                    right.redirects.stdout,
                    Some(OutputRedirect {
                        filename: "out.txt".to_string(),
                        append: false,
                    })
                );
            }
            command => panic!("expected pipeline, got {:?}", command),
        }
    }

    #[test]
    fn pipeline_missing_side() {
        assert!(ParsedJob::parse("| grep needle").is_err());
        assert!(ParsedJob::parse("ls |").is_err());
    }

    #[test]
    fn lone_redirect_operator() {
        assert!(ParsedJob::parse(">").is_err());
        assert!(ParsedJob::parse("> file").is_err());
    }
}
