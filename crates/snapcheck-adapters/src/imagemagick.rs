//! Similarity checks with ImageMagick's `compare`.

use std::path::Path;

use async_trait::async_trait;
use snapcheck_core::{
    CollaboratorResult, ComparisonOutcome, FuzzTolerance, SimilarityChecker,
};

use crate::error::{into_check, AdapterError, AdapterResult};
use crate::process::run;

/// Runs `compare -metric AE -fuzz <fuzz> <expected> <actual> <diff>`, so the
/// diff image is drawn over the baseline screenshot.
#[derive(Debug, Clone)]
pub struct ImageMagickChecker {
    program: String,
}

impl Default for ImageMagickChecker {
    fn default() -> Self {
        Self {
            program: "compare".to_string(),
        }
    }
}

impl ImageMagickChecker {
    /// Use a different binary, such as a `magick compare` wrapper script.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

/// Interpret a `compare` exit: 0 is similar, 1 is dissimilar, anything else
/// (including death by signal) means the images could not be compared.
pub fn outcome_for_exit(
    program: &str,
    output: &std::process::Output,
    diff: Option<&Path>,
) -> AdapterResult<ComparisonOutcome> {
    match output.status.code() {
        Some(0) => Ok(ComparisonOutcome::Passed),
        Some(1) => Ok(ComparisonOutcome::Changed {
            diff: diff.filter(|p| p.exists()).map(Path::to_path_buf),
        }),
        _ => Err(AdapterError::command_failed(program, output)),
    }
}

#[async_trait]
impl SimilarityChecker for ImageMagickChecker {
    async fn compare(
        &self,
        expected: &Path,
        actual: &Path,
        diff: Option<&Path>,
        fuzz: &FuzzTolerance,
    ) -> CollaboratorResult<ComparisonOutcome> {
        let expected_arg = expected.to_string_lossy();
        let actual_arg = actual.to_string_lossy();
        let diff_arg = diff
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|| "null:".to_string());

        let output = run(
            &self.program,
            &[
                "-metric",
                "AE",
                "-fuzz",
                fuzz.as_str(),
                &*expected_arg,
                &*actual_arg,
                diff_arg.as_str(),
            ],
            None,
        )
        .await
        .map_err(into_check)?;

        outcome_for_exit(&self.program, &output, diff).map_err(into_check)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;

    fn exit_with(code: i32) -> std::process::Output {
        let script = format!("echo 'compare: unable to open image' >&2; exit {code}");
        Command::new("sh")
            .arg("-c")
            .arg(script)
            .output()
            .unwrap()
    }

    #[test]
    fn exit_zero_passes() {
        let out = exit_with(0);
        assert_eq!(
            outcome_for_exit("compare", &out, None).unwrap(),
            ComparisonOutcome::Passed
        );
    }

    #[test]
    fn exit_one_is_changed_with_existing_diff_only() {
        let tmp = tempfile::tempdir().unwrap();
        let written = tmp.path().join("home.jpg");
        std::fs::write(&written, b"diff").unwrap();
        let out = exit_with(1);

        assert_eq!(
            outcome_for_exit("compare", &out, Some(written.as_path())).unwrap(),
            ComparisonOutcome::Changed {
                diff: Some(written.clone())
            }
        );
        assert_eq!(
            outcome_for_exit("compare", &out, Some(tmp.path().join("missing.jpg").as_path()))
                .unwrap(),
            ComparisonOutcome::Changed { diff: None }
        );
    }

    #[test]
    fn other_exits_are_errors() {
        let err = outcome_for_exit("compare", &exit_with(2), None).unwrap_err();
        assert!(err.to_string().contains("unable to open image"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn baseline_image_comes_before_actual() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let log = tmp.path().join("argv.log");
        let program = tmp.path().join("fake-compare");
        std::fs::write(
            &program,
            format!("#!/bin/sh\necho \"$@\" > '{}'\nexit 1\n", log.display()),
        )
        .unwrap();
        std::fs::set_permissions(&program, std::fs::Permissions::from_mode(0o755)).unwrap();

        let checker = ImageMagickChecker::with_program(program.to_string_lossy());
        let outcome = checker
            .compare(
                Path::new("EXPECTED.jpg"),
                Path::new("ACTUAL.jpg"),
                Some(Path::new("DIFF.jpg")),
                &FuzzTolerance::default(),
            )
            .await
            .unwrap();

        assert_eq!(outcome, ComparisonOutcome::Changed { diff: None });
        assert_eq!(
            std::fs::read_to_string(&log).unwrap().trim(),
            "-metric AE -fuzz 5% EXPECTED.jpg ACTUAL.jpg DIFF.jpg"
        );
    }

    #[tokio::test]
    async fn missing_binary_is_a_check_error() {
        let checker = ImageMagickChecker::with_program("snapcheck-no-such-compare");
        let tmp = tempfile::tempdir().unwrap();
        let err = checker
            .compare(
                &tmp.path().join("e.jpg"),
                &tmp.path().join("a.jpg"),
                None,
                &FuzzTolerance::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, snapcheck_core::CollaboratorError::Check(_)));
    }
}
