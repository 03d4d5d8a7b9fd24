#[cfg(test)]
mod tests {
    use super::super::*;
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    #[tokio::test]
    async fn production_runner_success() {
        let runner = runner::TokioProcessRunner;
        let command = ProcessCommandBuilder::new(Path::new("echo"))
            .arg("hello world")
            .build();

        let output = runner.run(command).await.unwrap();
        assert!(output.status.success());
        assert_eq!(output.stdout.trim(), "hello world");
        assert!(output.stderr.is_empty());
    }

    #[tokio::test]
    async fn production_runner_failure() {
        let runner = runner::TokioProcessRunner;
        let command = ProcessCommandBuilder::new(Path::new("false")).build();

        let output = runner.run(command).await.unwrap();
        assert!(!output.status.success());
        assert_eq!(output.status.code(), Some(1));
    }

    #[tokio::test]
    async fn production_runner_command_not_found() {
        let runner = runner::TokioProcessRunner;
        let command = ProcessCommandBuilder::new(Path::new("nonexistent-command-12345")).build();

        let result = runner.run(command).await;
        assert!(result.is_err());
        assert!(matches!(
            result.unwrap_err(),
            ProcessError::CommandNotFound(_)
        ));
    }

    #[tokio::test]
    async fn production_runner_timeout_kills_child() {
        let runner = runner::TokioProcessRunner;
        let command = ProcessCommandBuilder::new(Path::new("sleep"))
            .arg("5")
            .timeout(Duration::from_millis(100))
            .build();

        let output = runner.run(command).await.unwrap();
        assert_eq!(output.status, ExitStatus::Timeout);
        assert!(output.duration < Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn production_runner_exit_code_passthrough() {
        let runner = runner::TokioProcessRunner;
        let command = ProcessCommandBuilder::new(Path::new("/bin/sh"))
            .args(["-c", "exit 7"])
            .build();

        let output = runner.run(command).await.unwrap();
        assert_eq!(output.status, ExitStatus::Error(7));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn production_runner_replacement_env() {
        let mut env = HashMap::new();
        env.insert("GISBASE".to_string(), "/opt/engine".to_string());

        let runner = runner::TokioProcessRunner;
        let command = ProcessCommandBuilder::new(Path::new("/bin/sh"))
            .args(["-c", "echo \"$GISBASE\"; echo \"${HOME:-unset}\""])
            .env_map(env)
            .build();

        let output = runner.run(command).await.unwrap();
        assert!(output.status.success());
        let mut lines = output.stdout.lines();
        assert_eq!(lines.next(), Some("/opt/engine"));
        // Nothing outside the map leaks into the child.
        assert_eq!(lines.next(), Some("unset"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn production_runner_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner::TokioProcessRunner;
        let command = ProcessCommandBuilder::new(Path::new("/bin/sh"))
            .args(["-c", "pwd"])
            .current_dir(dir.path())
            .build();

        let output = runner.run(command).await.unwrap();
        assert!(output.status.success());
        assert_eq!(
            PathBuf::from(output.stdout.trim()).canonicalize().unwrap(),
            dir.path().canonicalize().unwrap()
        );
    }

    #[tokio::test]
    async fn production_runner_inherited_output_captures_nothing() {
        let runner = runner::TokioProcessRunner;
        let command = ProcessCommandBuilder::new(Path::new("echo"))
            .arg("streamed")
            .inherit_output()
            .build();

        let output = runner.run(command).await.unwrap();
        assert!(output.status.success());
        assert!(output.stdout.is_empty());
        assert!(output.stderr.is_empty());
    }

    #[tokio::test]
    async fn kv_argument_stays_one_argv_entry() {
        let command = ProcessCommandBuilder::new(Path::new("r.in.gdal"))
            .kv("input", "/data/has space/dem.tif")
            .kv("output", "dem")
            .arg("--overwrite")
            .build();

        assert_eq!(
            command.args,
            vec!["input=/data/has space/dem.tif", "output=dem", "--overwrite"]
        );
    }

    #[tokio::test]
    async fn mock_runner_basic() {
        let mut mock = MockProcessRunner::new();

        mock.expect_command(Path::new("/opt/engine/grass70"))
            .with_args(|args| args == ["-v"])
            .returns_stdout("GRASS GIS 7.0.0\n")
            .returns_success()
            .finish();

        let output = mock
            .run(
                ProcessCommandBuilder::new(Path::new("/opt/engine/grass70"))
                    .arg("-v")
                    .build(),
            )
            .await
            .unwrap();

        assert!(output.status.success());
        assert_eq!(output.stdout, "GRASS GIS 7.0.0\n");
        assert!(mock.verify_called(Path::new("/opt/engine/grass70"), 1));
    }

    #[tokio::test]
    async fn mock_runner_times_limit() {
        let mut mock = MockProcessRunner::new();

        mock.expect_command(Path::new("r.viewshed"))
            .returns_success()
            .times(1)
            .finish();

        let first = mock
            .run(ProcessCommandBuilder::new(Path::new("r.viewshed")).build())
            .await;
        assert!(first.is_ok());

        let second = mock
            .run(ProcessCommandBuilder::new(Path::new("r.viewshed")).build())
            .await;
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn mock_runner_unexpected_command() {
        let mock = MockProcessRunner::new();

        let result = mock
            .run(ProcessCommandBuilder::new(Path::new("r.out.gdal")).build())
            .await;
        assert!(matches!(
            result.unwrap_err(),
            ProcessError::MockExpectationNotMet(_)
        ));
    }

    #[tokio::test]
    async fn mock_runner_timeout_response() {
        let mut mock = MockProcessRunner::new();

        mock.expect_command(Path::new("r.viewshed"))
            .returns_timeout()
            .finish();

        let output = mock
            .run(ProcessCommandBuilder::new(Path::new("r.viewshed")).build())
            .await
            .unwrap();
        assert_eq!(output.status, ExitStatus::Timeout);
    }

    #[tokio::test]
    async fn subprocess_manager_dispatches_to_runner() {
        let (manager, mut mock) = SubprocessManager::mock();

        mock.expect_command(Path::new("grass70"))
            .returns_stdout("ok\n")
            .returns_success()
            .finish();

        let output = manager
            .runner()
            .run(ProcessCommandBuilder::new(Path::new("grass70")).build())
            .await
            .unwrap();

        assert!(output.status.success());
        assert_eq!(output.stdout, "ok\n");
    }

    #[test]
    fn process_command_builder_defaults_and_fields() {
        let env: HashMap<String, String> =
            [("GISRC".to_string(), "/tmp/rc".to_string())].into();
        let command = ProcessCommandBuilder::new(Path::new("grass70"))
            .arg("-c")
            .args(["-e", "/tmp/loc"])
            .env_map(env)
            .current_dir(Path::new("/tmp"))
            .timeout(Duration::from_secs(30))
            .inherit_output()
            .build();

        assert_eq!(command.program, PathBuf::from("grass70"));
        assert_eq!(command.args, vec!["-c", "-e", "/tmp/loc"]);
        assert_eq!(
            command.env.as_ref().and_then(|e| e.get("GISRC")),
            Some(&"/tmp/rc".to_string())
        );
        assert_eq!(command.working_dir, Some(PathBuf::from("/tmp")));
        assert_eq!(command.timeout, Duration::from_secs(30));
        assert_eq!(command.output, OutputMode::Inherited);

        let default = ProcessCommandBuilder::new(Path::new("grass70")).build();
        assert_eq!(default.timeout, DEFAULT_TIMEOUT);
        assert_eq!(default.output, OutputMode::Captured);
        assert!(default.env.is_none());
    }
}
