use crate::{Analysis, AnalysisError, DiagnosticKind, Diagnostics};

/// A wrapper around an analysis result for writing fluent tests.
pub struct TestResult {
    inner: Result<Analysis, AnalysisError>,
}

impl TestResult {
    pub fn new(result: Result<Analysis, AnalysisError>) -> Self {
        Self { inner: result }
    }

    /// Asserts that the run completed and returns the analysis. Diagnostics
    /// are allowed.
    pub fn assert_success(self) -> Analysis {
        match self.inner {
            Ok(analysis) => analysis,
            Err(e) => {
                panic!(
                    "\n🔴 TEST FAILED (Expected Success, but got Error):\nMessage:  {}\nError:    {:?}\n",
                    e, e
                );
            }
        }
    }

    /// Asserts that the run completed without a single diagnostic.
    pub fn assert_clean(self) -> Analysis {
        let analysis = self.assert_success();
        if !analysis.diagnostics.is_empty() {
            panic!(
                "\n🔴 TEST FAILED (Expected no diagnostics):\n{}",
                analysis.diagnostics
            );
        }
        analysis
    }

    /// Asserts that the run completed with at least one diagnostic of `kind`.
    pub fn assert_diagnostic(self, kind: DiagnosticKind) -> Analysis {
        let analysis = self.assert_success();
        if analysis.diagnostics.of_kind(kind).next().is_none() {
            panic!(
                "\n🔴 TEST FAILED (Missing Diagnostic):\nExpected kind: {:?}\nGot:\n{}",
                kind,
                render(&analysis.diagnostics)
            );
        }
        analysis
    }

    /// Asserts that the run aborted and returns the error.
    pub fn assert_failure(self) -> AnalysisError {
        match self.inner {
            Ok(analysis) => {
                panic!(
                    "\n🔴 TEST FAILED (Expected Failure, but got Success):\nDiagnostics:\n{}",
                    render(&analysis.diagnostics)
                );
            }
            Err(e) => e,
        }
    }

    /// Asserts that the run aborted with an error message containing `expected_msg_part`.
    pub fn assert_failure_contains(self, expected_msg_part: &str) {
        let err = self.assert_failure();
        let actual_msg = err.to_string();
        if !actual_msg.contains(expected_msg_part) {
            panic!(
                "\n🔴 TEST FAILED (Error Message Mismatch):\nExpected part: {:?}\nActual msg:    {:?}\n",
                expected_msg_part, actual_msg
            );
        }
    }
}

fn render(diagnostics: &Diagnostics) -> String {
    if diagnostics.is_empty() {
        "(none)\n".to_string()
    } else {
        diagnostics.to_string()
    }
}

pub trait Testable {
    fn test(self) -> TestResult;
}

impl Testable for Result<Analysis, AnalysisError> {
    fn test(self) -> TestResult {
        TestResult::new(self)
    }
}
