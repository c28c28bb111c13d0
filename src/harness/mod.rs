/// The scripted compliance conversation
///
/// A run spawns the server, walks the fixed [`TestCase`] sequence once, and
/// always ends by tearing the process down, whatever happened before. Every
/// case yields exactly one verdict, so a report always has one row per case.

pub mod arguments;
pub mod validation;

use std::time::Duration;

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::HarnessConfig;
use crate::mcp::{
    ClientInfo, InitializeParams, JsonRpcNotification, JsonRpcRequest, ResponseBody,
    ToolCallParams,
};
use crate::process::{ProcessState, ProcessSupervisor, SubprocessHandle, WaitOutcome};
use crate::report::{ReportBuilder, RunReport, Verdict};
use crate::transport::{Outcome, StdioTransport};

pub use arguments::sample_arguments;
pub use validation::{validate, NotSent, Observation, StopObservation, ValidationContext};

/// Title printed above every harness report
pub const REPORT_TITLE: &str = "MCP Forge Test Results";

/// Method no MCP server implements, used to exercise error handling
pub const UNKNOWN_METHOD: &str = "mcp-forge/nonexistent";

/// Time given to a server whose stdin broke to report its exit code
const EXIT_REAP_GRACE: Duration = Duration::from_secs(1);

/// One step of the compliance script
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TestCase {
    ServerStart,
    Initialize,
    ToolsList,
    ToolsCall,
    Ping,
    UnknownMethod,
    ServerStop,
}

impl TestCase {
    /// The script, in execution order
    pub const ALL: [TestCase; 7] = [
        TestCase::ServerStart,
        TestCase::Initialize,
        TestCase::ToolsList,
        TestCase::ToolsCall,
        TestCase::Ping,
        TestCase::UnknownMethod,
        TestCase::ServerStop,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TestCase::ServerStart => "server_start",
            TestCase::Initialize => "initialize",
            TestCase::ToolsList => "tools/list",
            TestCase::ToolsCall => "tools/call",
            TestCase::Ping => "ping",
            TestCase::UnknownMethod => "unknown_method",
            TestCase::ServerStop => "server_stop",
        }
    }

    /// JSON-RPC method sent by this case; `None` for lifecycle steps
    pub fn method(self) -> Option<&'static str> {
        match self {
            TestCase::ServerStart | TestCase::ServerStop => None,
            TestCase::Initialize => Some("initialize"),
            TestCase::ToolsList => Some("tools/list"),
            TestCase::ToolsCall => Some("tools/call"),
            TestCase::Ping => Some("ping"),
            TestCase::UnknownMethod => Some(UNKNOWN_METHOD),
        }
    }

    /// Build this case's request, or say why there is nothing to send
    ///
    /// `tools` is what tools/list advertised, `None` if it failed.
    pub fn build_request(
        self,
        id: i64,
        config: &HarnessConfig,
        tools: Option<&[Value]>,
    ) -> Result<JsonRpcRequest, NotSent> {
        let Some(method) = self.method() else {
            return Err(NotSent::Lifecycle);
        };
        let params = match self {
            TestCase::Initialize => Some(json!(InitializeParams {
                protocol_version: config.protocol_version.clone(),
                capabilities: json!({}),
                client_info: ClientInfo::default(),
            })),
            TestCase::ToolsCall => {
                let tool = tools
                    .ok_or(NotSent::ToolListUnavailable)?
                    .first()
                    .ok_or(NotSent::NoToolsAdvertised)?;
                let name = tool["name"].as_str().unwrap_or_default().to_string();
                let arguments = tool
                    .get("inputSchema")
                    .map(sample_arguments)
                    .unwrap_or_default();
                Some(json!(ToolCallParams { name, arguments }))
            }
            _ => None,
        };
        Ok(JsonRpcRequest::new(id, method, params))
    }
}

/// Run the full compliance script against the configured server
pub async fn run_test_suite(config: &HarnessConfig) -> RunReport {
    TestScript::new(config).run().await
}

/// State carried across the cases of one run
struct TestScript<'a> {
    config: &'a HarnessConfig,
    supervisor: ProcessSupervisor,
    transport: StdioTransport,
    report: ReportBuilder,
    ctx: ValidationContext,
    next_id: i64,
    /// Tools advertised by a passing tools/list
    tools: Option<Vec<Value>>,
    /// Cause recorded on every case skipped after a halting failure
    halted: Option<String>,
}

impl<'a> TestScript<'a> {
    fn new(config: &'a HarnessConfig) -> Self {
        let supervisor = ProcessSupervisor::new();
        Self {
            config,
            transport: StdioTransport::new(supervisor.clone()),
            supervisor,
            report: ReportBuilder::new(REPORT_TITLE, config.command.display()),
            ctx: ValidationContext::from_config(config),
            next_id: 1,
            tools: None,
            halted: None,
        }
    }

    async fn run(mut self) -> RunReport {
        info!(command = %self.config.command.display(), "starting compliance run");

        let working_dir = self.config.working_dir.as_deref();
        let mut handle = match self.supervisor.start(&self.config.command, working_dir) {
            Ok(handle) => handle,
            Err(e) => {
                warn!(error = %e, "server failed to spawn");
                self.judge(TestCase::ServerStart, &Observation::SpawnFailed(e.to_string()));
                for case in &TestCase::ALL[1..] {
                    self.report.record(Verdict::skipped(case.name(), "server_start failed"));
                }
                return self.report.finalize();
            }
        };

        let started = self
            .supervisor
            .wait_with_timeout(&mut handle, self.config.startup_timeout)
            .await;
        if !self.judge(TestCase::ServerStart, &Observation::Started(started)) {
            self.halted = Some("server_start failed".to_string());
        }

        for case in [
            TestCase::Initialize,
            TestCase::ToolsList,
            TestCase::ToolsCall,
            TestCase::Ping,
            TestCase::UnknownMethod,
        ] {
            self.run_request_case(case, &mut handle).await;
        }

        let stop = self.stop(&mut handle).await;
        self.judge(TestCase::ServerStop, &Observation::Stopped(stop));

        let stderr = self.supervisor.release(handle).await;
        self.report.attach_stderr(stderr);
        let report = self.report.finalize();
        info!(
            passed = report.passed,
            failed = report.failed,
            skipped = report.skipped,
            "compliance run finished"
        );
        report
    }

    async fn run_request_case(&mut self, case: TestCase, handle: &mut SubprocessHandle) {
        if let Some(cause) = &self.halted {
            self.report.record(Verdict::skipped(case.name(), cause));
            return;
        }
        if let Some(WaitOutcome::Exited(code)) = handle.poll_exit() {
            self.skip_after_exit(case, code);
            return;
        }

        let request = match case.build_request(self.next_id, self.config, self.tools.as_deref()) {
            Ok(request) => request,
            Err(reason) => {
                self.judge(case, &Observation::NotSent(reason));
                return;
            }
        };
        self.next_id += 1;
        if case == TestCase::ToolsCall {
            self.ctx.tool_name = request
                .params
                .as_ref()
                .and_then(|p| p["name"].as_str())
                .map(str::to_string);
        }

        let outcome = self.exchange(handle, &request).await;
        let halts = match &outcome {
            Outcome::Response(_) => false,
            Outcome::ProcessExited(code) => {
                self.skip_after_exit(case, *code);
                return;
            }
            Outcome::Timeout => true,
            Outcome::TransportError(e) => e.halts_run(),
        };
        if outcome == Outcome::Timeout {
            warn!(case = case.name(), "request timed out, killing server");
            self.supervisor.kill(handle).await;
        }

        let observation = Observation::Reply(outcome);
        let passed = self.judge(case, &observation);
        if halts {
            self.halted = Some(format!("{} failed", case.name()));
            return;
        }

        match case {
            TestCase::Initialize if passed => self.send_initialized(handle).await,
            TestCase::ToolsList if passed => {
                if let Observation::Reply(Outcome::Response(response)) = &observation {
                    self.tools = advertised_tools(response.body().ok());
                }
            }
            _ => {}
        }
    }

    /// Record `case` as skipped because the server is gone, and halt the script
    ///
    /// The exit may be seen before the request is written, by the write, or
    /// as stdout closing; all three land here so the report does not depend
    /// on which one won the race.
    fn skip_after_exit(&mut self, case: TestCase, code: Option<i32>) {
        let cause = match code {
            Some(code) => format!("server exited with code {}", code),
            None => "server exited by signal".to_string(),
        };
        info!(case = case.name(), cause = %cause, "server gone without answering, skipping");
        self.report.record(Verdict::skipped(case.name(), &cause));
        self.halted = Some(cause);
    }

    /// Send one request and wait for its response
    async fn exchange(&self, handle: &mut SubprocessHandle, request: &JsonRpcRequest) -> Outcome {
        if let Err(e) = self.transport.send(handle, request).await {
            // A write failure on a dead process is a process exit, not a pipe problem
            return match self.supervisor.wait_with_timeout(handle, EXIT_REAP_GRACE).await {
                WaitOutcome::Exited(code) => Outcome::ProcessExited(code),
                WaitOutcome::TimedOut => Outcome::TransportError(e),
            };
        }
        self.transport
            .receive(handle, &request.id, self.config.request_timeout)
            .await
    }

    async fn send_initialized(&self, handle: &mut SubprocessHandle) {
        let notification = JsonRpcNotification::new("notifications/initialized", None);
        if let Err(e) = self.transport.notify(handle, &notification).await {
            warn!(error = %e, "failed to send initialized notification");
        }
    }

    /// Close stdin and give the server the shutdown timeout to exit
    async fn stop(&self, handle: &mut SubprocessHandle) -> StopObservation {
        if let Some(WaitOutcome::Exited(code)) = handle.poll_exit() {
            return StopObservation::AlreadyGone {
                state: handle.state(),
                code,
            };
        }
        match self
            .supervisor
            .terminate(handle, self.config.shutdown_timeout)
            .await
        {
            ProcessState::Killed => StopObservation::Killed,
            _ => StopObservation::Exited(handle.exit_code()),
        }
    }

    /// Validate, record, and report whether the case passed
    fn judge(&mut self, case: TestCase, observation: &Observation) -> bool {
        let verdict = validate(case, observation, &self.ctx);
        let passed = verdict.passed();
        if passed {
            debug!(case = case.name(), detail = %verdict.detail, "case passed");
        } else {
            info!(case = case.name(), detail = %verdict.detail, "case failed");
        }
        self.report.record(verdict);
        passed
    }
}

/// Tool descriptors from a tools/list response body
fn advertised_tools(body: Option<ResponseBody<'_>>) -> Option<Vec<Value>> {
    match body? {
        ResponseBody::Result(result) => result.get("tools")?.as_array().cloned(),
        ResponseBody::Error(_) => None,
    }
}
