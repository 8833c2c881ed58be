use std::io::{self, Write};
use std::process::{Command, Stdio};

use tracing::debug;

use crate::resolver::{ResolveRequest, ResolveResponse, ResolverError, SimilarityResolver};

/// Delegates scoring to an external program: the request JSON goes to its
/// stdin and a response JSON is expected on its stdout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResolver {
    argv: Vec<String>,
}

impl CommandResolver {
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }
}

impl SimilarityResolver for CommandResolver {
    fn resolve(&self, request: &ResolveRequest) -> Result<ResolveResponse, ResolverError> {
        let (program, args) = self.argv.split_first().ok_or(ResolverError::Disabled)?;
        let payload = serde_json::to_vec(request)?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ResolverError::Spawn {
                program: program.clone(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            // A program may answer without reading its input.
            match stdin.write_all(&payload) {
                Ok(()) => {}
                Err(err) if err.kind() == io::ErrorKind::BrokenPipe => {}
                Err(err) => return Err(err.into()),
            }
        }

        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(ResolverError::Exit {
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let response: ResolveResponse = serde_json::from_slice(&output.stdout)?;
        debug!(
            program = %program,
            returned = response.similarities.len(),
            "resolver command finished"
        );
        Ok(response)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::corpus::FactType;
    use crate::resolver::FactQuery;

    fn sh(script: &str) -> CommandResolver {
        CommandResolver::new(vec!["sh".to_string(), "-c".to_string(), script.to_string()])
    }

    fn request() -> ResolveRequest {
        ResolveRequest {
            facts: vec![
                FactQuery {
                    fact_type: FactType::Work,
                    fact_value: "google".to_string(),
                },
                FactQuery {
                    fact_type: FactType::Work,
                    fact_value: "alphabet".to_string(),
                },
            ],
        }
    }

    #[test]
    fn reads_response_from_stdout() {
        let resolver = sh(
            r#"cat >/dev/null; echo '{"success":true,"similarities":[{"value_a":"google","value_b":"alphabet","fact_type":"work","score":0.8}]}'"#,
        );
        let response = resolver.resolve(&request()).expect("resolve");
        assert!(response.success);
        assert_eq!(response.similarities.len(), 1);
        assert_eq!(response.similarities[0].score, 0.8);
    }

    #[test]
    fn passes_request_on_stdin() {
        let resolver = sh(
            r#"input=$(cat); case "$input" in *'"fact_value":"alphabet"'*) echo '{"success":true}';; *) echo '{"success":false}';; esac"#,
        );
        let response = resolver.resolve(&request()).expect("resolve");
        assert!(response.success);
    }

    #[test]
    fn non_zero_exit_is_an_error() {
        let resolver = sh("cat >/dev/null; echo boom >&2; exit 3");
        match resolver.resolve(&request()) {
            Err(ResolverError::Exit { code, stderr }) => {
                assert_eq!(code, 3);
                assert_eq!(stderr, "boom");
            }
            other => panic!("expected exit error, got {other:?}"),
        }
    }

    #[test]
    fn garbage_output_is_a_decode_error() {
        let resolver = sh("cat >/dev/null; echo not-json");
        assert!(matches!(
            resolver.resolve(&request()),
            Err(ResolverError::Decode(_))
        ));
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let resolver = CommandResolver::new(vec!["/definitely/not/a/resolver".to_string()]);
        assert!(matches!(
            resolver.resolve(&request()),
            Err(ResolverError::Spawn { .. })
        ));
        assert!(matches!(
            CommandResolver::new(Vec::new()).resolve(&request()),
            Err(ResolverError::Disabled)
        ));
    }
}
