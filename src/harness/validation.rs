/// Per-case validation of what the server did
///
/// Pure functions: an observation goes in, a verdict comes out. Nothing here
/// touches the process or the clock.

use std::time::Duration;

use serde_json::Value;

use crate::config::HarnessConfig;
use crate::harness::TestCase;
use crate::mcp::{error_codes, JsonRpcError, JsonRpcResponse, ResponseBody};
use crate::process::{ProcessState, WaitOutcome};
use crate::report::Verdict;
use crate::transport::Outcome;
use crate::validator::schema;

/// Everything the harness saw for one case
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    /// The spawn itself failed
    SpawnFailed(String),
    /// Result of the startup wait; `TimedOut` means still running
    Started(WaitOutcome),
    /// A request went out and this came back
    Reply(Outcome),
    /// The case decided not to send a request
    NotSent(NotSent),
    Stopped(StopObservation),
}

/// Why a request case sent nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotSent {
    /// tools/list succeeded with an empty list
    NoToolsAdvertised,
    /// tools/list failed, so there is no tool to call
    ToolListUnavailable,
    /// Lifecycle steps never send a request
    Lifecycle,
}

/// How the server ended during teardown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopObservation {
    /// Exited within the shutdown timeout after stdin closed
    Exited(Option<i32>),
    /// Still running after the shutdown timeout and killed
    Killed,
    /// Already gone before teardown began
    AlreadyGone {
        state: ProcessState,
        code: Option<i32>,
    },
}

/// Settings that influence judgment
#[derive(Debug, Clone)]
pub struct ValidationContext {
    pub startup_timeout: Duration,
    pub request_timeout: Duration,
    pub shutdown_timeout: Duration,
    pub unknown_method_codes: Vec<i64>,
    pub strict_shutdown: bool,
    /// Tool named in the tools/call request, if one was sent
    pub tool_name: Option<String>,
}

impl ValidationContext {
    pub fn from_config(config: &HarnessConfig) -> Self {
        Self {
            startup_timeout: config.startup_timeout,
            request_timeout: config.request_timeout,
            shutdown_timeout: config.shutdown_timeout,
            unknown_method_codes: config.unknown_method_codes.clone(),
            strict_shutdown: config.strict_shutdown,
            tool_name: None,
        }
    }
}

/// Pass detail or failure detail for a case
type Judgment = Result<String, String>;

/// Judge one case
pub fn validate(case: TestCase, observation: &Observation, ctx: &ValidationContext) -> Verdict {
    let judgment = match case {
        TestCase::ServerStart => validate_server_start(observation, ctx),
        TestCase::Initialize => on_reply(observation, ctx, validate_initialize),
        TestCase::ToolsList => on_reply(observation, ctx, validate_tools_list),
        TestCase::ToolsCall => match observation {
            Observation::NotSent(NotSent::NoToolsAdvertised) => {
                Ok("no tools advertised; nothing to call".to_string())
            }
            Observation::NotSent(NotSent::ToolListUnavailable) => {
                Err("no tool to call: tools/list did not return a usable tool list".to_string())
            }
            _ => on_reply(observation, ctx, |response| {
                validate_tools_call(response, ctx.tool_name.as_deref().unwrap_or("<unnamed>"))
            }),
        },
        TestCase::Ping => on_reply(observation, ctx, validate_ping),
        TestCase::UnknownMethod => on_reply(observation, ctx, |response| {
            validate_unknown_method(response, &ctx.unknown_method_codes)
        }),
        TestCase::ServerStop => validate_server_stop(observation, ctx),
    };

    match judgment {
        Ok(detail) => Verdict::pass(case.name(), detail),
        Err(detail) => Verdict::fail(case.name(), detail),
    }
}

fn validate_server_start(observation: &Observation, ctx: &ValidationContext) -> Judgment {
    match observation {
        Observation::SpawnFailed(reason) => Err(format!("SpawnError: {}", reason)),
        Observation::Started(WaitOutcome::TimedOut) => Ok(format!(
            "process running after {} ms startup window",
            ctx.startup_timeout.as_millis()
        )),
        Observation::Started(WaitOutcome::Exited(code)) => Err(format!(
            "ProcessExited: server exited {} during startup",
            describe_exit(*code)
        )),
        other => Err(unexpected(other)),
    }
}

fn validate_server_stop(observation: &Observation, ctx: &ValidationContext) -> Judgment {
    match observation {
        Observation::Stopped(StopObservation::Exited(code)) => Ok(format!(
            "exited {} after stdin was closed",
            describe_exit(*code)
        )),
        Observation::Stopped(StopObservation::Killed) => {
            let detail = format!(
                "slow shutdown: still running {} ms after stdin was closed; forcefully killed",
                ctx.shutdown_timeout.as_millis()
            );
            if ctx.strict_shutdown {
                Err(detail)
            } else {
                Ok(detail)
            }
        }
        Observation::Stopped(StopObservation::AlreadyGone { state, code }) => match state {
            ProcessState::Killed => Ok(
                "process already killed after an earlier failure; nothing to terminate".to_string(),
            ),
            _ => Ok(format!(
                "process already exited {}; nothing to terminate",
                describe_exit(*code)
            )),
        },
        other => Err(unexpected(other)),
    }
}

/// Route the non-response outcomes to failures; hand responses to `check`
fn on_reply<F>(observation: &Observation, ctx: &ValidationContext, check: F) -> Judgment
where
    F: FnOnce(&JsonRpcResponse) -> Judgment,
{
    match observation {
        Observation::Reply(Outcome::Response(response)) => check(response),
        Observation::Reply(Outcome::Timeout) => Err(format!(
            "Timeout: no response within {} ms",
            ctx.request_timeout.as_millis()
        )),
        Observation::Reply(Outcome::ProcessExited(code)) => Err(format!(
            "ProcessExited: server exited {} before responding",
            describe_exit(*code)
        )),
        Observation::Reply(Outcome::TransportError(e)) => Err(format!("TransportError: {}", e)),
        other => Err(unexpected(other)),
    }
}

fn validate_initialize(response: &JsonRpcResponse) -> Judgment {
    let result = expect_result(response)?;
    let problems = schema::check_initialize_result(result);
    if !problems.is_empty() {
        return Err(violation(&problems));
    }
    let version = result["protocolVersion"].as_str().unwrap_or_default();
    let name = result["serverInfo"]["name"].as_str().unwrap_or_default();
    let server_version = result["serverInfo"]["version"].as_str().unwrap_or_default();
    Ok(format!(
        "protocol {}, server {} {}",
        version, name, server_version
    ))
}

fn validate_tools_list(response: &JsonRpcResponse) -> Judgment {
    let result = expect_result(response)?;
    let tools = match result.get("tools") {
        Some(Value::Array(tools)) => tools,
        Some(_) => return Err(violation(&["`tools` must be an array".to_string()])),
        None => return Err(violation(&["result is missing `tools`".to_string()])),
    };
    let problems = schema::check_tool_definitions(tools);
    if !problems.is_empty() {
        return Err(violation(&problems));
    }
    Ok(format!("found {} tool(s)", tools.len()))
}

fn validate_tools_call(response: &JsonRpcResponse, tool: &str) -> Judgment {
    match body(response)? {
        ResponseBody::Result(result) => {
            let problems = schema::check_tool_result(result);
            if !problems.is_empty() {
                return Err(violation(&problems));
            }
            let blocks = result["content"].as_array().map_or(0, Vec::len);
            if result.get("isError").and_then(Value::as_bool) == Some(true) {
                Ok(format!(
                    "`{}` reported a tool error with {} content block(s)",
                    tool, blocks
                ))
            } else {
                Ok(format!("`{}` returned {} content block(s)", tool, blocks))
            }
        }
        ResponseBody::Error(error) if error.code == error_codes::METHOD_NOT_FOUND => Err(format!(
            "tools/call is not implemented: {}",
            describe_error(&error)
        )),
        ResponseBody::Error(error) => Ok(format!(
            "`{}` answered with a JSON-RPC error: {}",
            tool,
            describe_error(&error)
        )),
    }
}

fn validate_ping(response: &JsonRpcResponse) -> Judgment {
    expect_result(response).map(|_| "pong".to_string())
}

fn validate_unknown_method(response: &JsonRpcResponse, accepted: &[i64]) -> Judgment {
    match body(response)? {
        ResponseBody::Result(_) => Err(
            "an error response was required for an unknown method, but the server returned a result"
                .to_string(),
        ),
        ResponseBody::Error(error) if accepted.contains(&error.code) => {
            Ok(format!("rejected with {}", describe_error(&error)))
        }
        ResponseBody::Error(error) => Err(format!(
            "expected error code {}, got {}",
            list_codes(accepted),
            describe_error(&error)
        )),
    }
}

fn body(response: &JsonRpcResponse) -> Result<ResponseBody<'_>, String> {
    response
        .body()
        .map_err(|violation| format!("ProtocolViolation: {}", violation))
}

/// The `result` member; an `error` here fails the case
fn expect_result(response: &JsonRpcResponse) -> Result<&Value, String> {
    match body(response)? {
        ResponseBody::Result(result) => Ok(result),
        ResponseBody::Error(error) => Err(format!("server returned {}", describe_error(&error))),
    }
}

fn violation(problems: &[String]) -> String {
    format!("ProtocolViolation: {}", problems.join("; "))
}

fn describe_error(error: &JsonRpcError) -> String {
    format!("error {}: {}", error.code, error.message)
}

fn describe_exit(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("with code {}", code),
        None => "by signal".to_string(),
    }
}

fn list_codes(codes: &[i64]) -> String {
    match codes {
        [single] => single.to_string(),
        _ => {
            let joined: Vec<String> = codes.iter().map(i64::to_string).collect();
            format!("one of [{}]", joined.join(", "))
        }
    }
}

fn unexpected(observation: &Observation) -> String {
    format!("internal: unexpected observation {:?}", observation)
}
