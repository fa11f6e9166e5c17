//! End-to-end sessions: frames in, frames out, through the real catalog.

use std::cell::RefCell;
use std::io::{self, Cursor, Write};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use ndtools::config::Config;
use ndtools::content::EmbeddedContent;
use ndtools::mcp::tools::{ReturnType, ToolDescriptor, ToolOutput, ToolRegistry};
use ndtools::mcp::{Catalog, ServerInfo, Service};
use ndtools::server::{self, Server, ShutdownReason, State};
use ndtools::wire::stdio::ThreadedInbox;
use ndtools::wire::{Frame, FrameReader, Inbound, Inbox};
use serde_json::{Value, json};

fn nexus_server() -> Server {
    Server::new(server::assemble(&Config::default()).unwrap())
}

fn lines(input: &[Value]) -> Vec<u8> {
    let mut bytes = Vec::new();
    for value in input {
        bytes.extend_from_slice(value.to_string().as_bytes());
        bytes.push(b'\n');
    }
    bytes
}

fn run(server: &mut Server, input: Vec<u8>) -> Vec<Value> {
    let mut inbox = FrameReader::new(Cursor::new(input), 1 << 20);
    let mut output = Vec::new();
    server.serve(&mut inbox, &mut output).unwrap();
    parse_output(&output)
}

fn parse_output(output: &[u8]) -> Vec<Value> {
    output
        .split(|b| *b == b'\n')
        .filter(|line| !line.is_empty())
        .map(|line| serde_json::from_slice(line).unwrap())
        .collect()
}

fn call(id: Value, name: &str, arguments: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools/call",
        "params": { "name": name, "arguments": arguments },
    })
}

#[test]
fn scenarios_success_unknown_tool_and_malformed() {
    let mut input = lines(&[
        call(json!("1"), "vrf_payload_example", json!({})),
        call(json!("2"), "does_not_exist", json!({})),
    ]);
    input.extend_from_slice(b"{\"jsonrpc\":\"2.0\",\"id\":\"3\",\"method\":\"tools/ca\n");
    input.extend_from_slice(&lines(&[json!({ "jsonrpc": "2.0", "id": "4", "method": "tools/list" })]));

    let mut server = nexus_server();
    let responses = run(&mut server, input);
    assert_eq!(responses.len(), 4);

    let a = &responses[0];
    assert_eq!(a["id"], "1");
    assert_eq!(a["result"]["isError"], false);
    assert_eq!(a["result"]["structuredContent"]["vrfName"], "ansible-vrf-int1");
    assert_eq!(a["result"]["structuredContent"]["fabric"], "f1");

    let b = &responses[1];
    assert_eq!(b["id"], "2");
    assert_eq!(b["error"]["data"]["kind"], "UnknownTool");
    assert_eq!(b["error"]["data"]["detail"]["tool"], "does_not_exist");

    let c = &responses[2];
    assert_eq!(c["id"], "3");
    assert_eq!(c["error"]["data"]["kind"], "MalformedMessage");
    assert_eq!(c["error"]["code"], -32700);

    assert_eq!(responses[3]["id"], "4");
    assert!(responses[3]["result"]["tools"].is_array());
    assert_eq!(server.state(), State::Stopped);
}

#[test]
fn tools_list_describes_the_catalog() {
    let responses = run(
        &mut nexus_server(),
        lines(&[
            json!({ "jsonrpc": "2.0", "id": 0, "method": "initialize", "params": {} }),
            json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }),
            json!({ "jsonrpc": "2.0", "id": 1, "method": "tools/list" }),
        ]),
    );
    assert_eq!(responses.len(), 2);
    let init = &responses[0]["result"];
    assert_eq!(init["serverInfo"]["name"], "NexusDashboardDeveloperTools");
    assert!(init["instructions"].as_str().unwrap().contains("Nexus Dashboard REST API"));

    let tools = responses[1]["result"]["tools"].as_array().unwrap();
    let query = tools
        .iter()
        .find(|t| t["name"] == "vrf_attachments_query")
        .unwrap();
    assert_eq!(query["outputType"], "structured");
    let properties: Vec<&String> = query["inputSchema"]["properties"]
        .as_object()
        .unwrap()
        .keys()
        .collect();
    assert_eq!(properties, ["vrf_name", "switch_role", "attached_only", "limit"]);
    assert_eq!(query["inputSchema"]["properties"]["attached_only"]["default"], false);

    let reference = tools
        .iter()
        .find(|t| t["name"] == "vrf_payload_reference")
        .unwrap();
    assert_eq!(reference["outputType"], "text");
    assert_eq!(
        reference["inputSchema"]["properties"]["topic"]["enum"],
        json!(["vrf", "vrf_attachment"])
    );
}

#[test]
fn binding_failures_are_reported_per_request() {
    let responses = run(
        &mut nexus_server(),
        lines(&[
            call(json!(1), "vrf_attachments_query", json!({ "limit": "10" })),
            call(json!(2), "vrf_payload_reference", json!({ "topic": "bgp" })),
            call(json!(3), "vrf_attachments_query", json!({ "limit": -1 })),
            call(json!(4), "vrf_attachments_query", json!({ "switch_role": "border spine" })),
        ]),
    );
    assert_eq!(responses[0]["error"]["data"]["kind"], "TypeMismatch");
    assert_eq!(responses[0]["error"]["data"]["detail"]["parameter"], "limit");
    assert_eq!(responses[1]["error"]["data"]["kind"], "TypeMismatch");
    assert_eq!(responses[2]["error"]["data"]["kind"], "HandlerError");
    assert_eq!(responses[2]["error"]["code"], -32603);
    let found = &responses[3]["result"]["structuredContent"];
    assert_eq!(found["count"], 1);
    assert_eq!(found["attachments"][0]["switchName"], "cvd-1211-spine");
}

#[test]
fn resources_and_prompts_are_served() {
    let responses = run(
        &mut nexus_server(),
        lines(&[
            json!({ "jsonrpc": "2.0", "id": 1, "method": "resources/list" }),
            json!({ "jsonrpc": "2.0", "id": 2, "method": "resources/read",
                    "params": { "uri": "file:///resources/payloads/v3/md/vrf_attachment.md" } }),
            json!({ "jsonrpc": "2.0", "id": 3, "method": "prompts/list" }),
            json!({ "jsonrpc": "2.0", "id": 4, "method": "prompts/get",
                    "params": { "name": "ansible_developer_role" } }),
            json!({ "jsonrpc": "2.0", "id": 5, "method": "resources/read",
                    "params": { "uri": "file:///resources/nothing" } }),
        ]),
    );
    let resources = responses[0]["result"]["resources"].as_array().unwrap();
    assert_eq!(resources.len(), 3);
    assert!(resources.iter().any(|r| r["uri"] == "file:///resources/payloads/vrf.json"
        && r["mimeType"] == "application/json"));

    let contents = &responses[1]["result"]["contents"][0];
    assert_eq!(contents["mimeType"], "text/markdown");
    assert!(!contents["text"].as_str().unwrap().is_empty());

    assert_eq!(responses[2]["result"]["prompts"][0]["name"], "ansible_developer_role");
    assert_eq!(responses[3]["result"]["messages"][0]["role"], "user");
    assert_eq!(responses[4]["error"]["data"]["kind"], "UnknownResource");
}

#[test]
fn content_directory_overrides_embedded_files() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("payloads/v3")).unwrap();
    std::fs::write(
        dir.path().join("payloads/v3/vrf.json"),
        r#"{"vrfName":"lab-vrf","fabric":"lab"}"#,
    )
    .unwrap();
    let config = Config {
        content_dir: Some(dir.path().to_path_buf()),
        ..Config::default()
    };
    let mut server = Server::new(server::assemble(&config).unwrap());
    let responses = run(
        &mut server,
        lines(&[
            call(json!(1), "vrf_payload_example", json!({})),
            call(json!(2), "vrf_attachments_response_example", json!({})),
        ]),
    );
    assert_eq!(responses[0]["result"]["structuredContent"]["vrfName"], "lab-vrf");
    assert_eq!(responses[1]["result"]["structuredContent"]["RETURN_CODE"], 200);
}

/// Output shared between the writer handed to the server and the inbox.
#[derive(Clone, Default)]
struct SharedOutput(Rc<RefCell<Vec<u8>>>);

impl Write for SharedOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Records how many responses had been written each time a frame was asked for.
struct RecordingInbox {
    frames: Vec<Vec<u8>>,
    output: SharedOutput,
    seen: Vec<usize>,
}

impl Inbox for RecordingInbox {
    fn next_frame(&mut self) -> io::Result<Inbound> {
        let written = self.output.0.borrow().iter().filter(|b| **b == b'\n').count();
        self.seen.push(written);
        if self.frames.is_empty() {
            return Ok(Inbound::Closed);
        }
        Ok(Inbound::Frame(Frame::Message(self.frames.remove(0))))
    }
}

#[test]
fn each_response_is_written_before_the_next_read() {
    let output = SharedOutput::default();
    let frames: Vec<Vec<u8>> = (1..=3)
        .map(|i| call(json!(i), "vrf_payload_reference", json!({})).to_string().into_bytes())
        .collect();
    let mut inbox = RecordingInbox {
        frames,
        output: output.clone(),
        seen: Vec::new(),
    };
    let shutdown = nexus_server().serve(&mut inbox, output.clone()).unwrap();
    assert_eq!(shutdown.requests, 3);
    assert_eq!(inbox.seen, [0, 1, 2, 3]);
}

fn slow_service() -> Service {
    let mut tools = ToolRegistry::builder();
    tools
        .register(ToolDescriptor::new("slow", "takes its time", ReturnType::Text, |_| {
            std::thread::sleep(Duration::from_millis(120));
            Ok(ToolOutput::Text("done slowly".to_string()))
        }))
        .unwrap();
    tools
        .register(ToolDescriptor::new("fast", "answers at once", ReturnType::Text, |_| {
            Ok(ToolOutput::Text("done".to_string()))
        }))
        .unwrap();
    let catalog = Catalog {
        tools: tools.build(),
        ..Catalog::default()
    };
    Service::new(ServerInfo::new("slow"), catalog, Arc::new(EmbeddedContent))
}

fn never() -> Option<i32> {
    None
}

#[test]
fn slow_handler_delays_without_interleaving() {
    let input = lines(&[
        call(json!("a"), "slow", json!({})),
        call(json!("b"), "fast", json!({})),
        call(json!("c"), "slow", json!({})),
    ]);
    let mut inbox = ThreadedInbox::spawn(Cursor::new(input), 1 << 20, never).unwrap();
    let mut output = Vec::new();
    let shutdown = Server::new(slow_service())
        .serve(&mut inbox, &mut output)
        .unwrap();
    assert_eq!(shutdown.reason, ShutdownReason::EndOfStream);

    let responses = parse_output(&output);
    let ids: Vec<&Value> = responses.iter().map(|r| &r["id"]).collect();
    assert_eq!(ids, [&json!("a"), &json!("b"), &json!("c")]);
    assert_eq!(responses[0]["result"]["content"][0]["text"], "done slowly");
    assert_eq!(responses[1]["result"]["content"][0]["text"], "done");
}

#[test]
fn blank_lines_and_crlf_are_tolerated() {
    let mut input = b"\r\n\n".to_vec();
    input.extend_from_slice(b"{\"jsonrpc\":\"2.0\",\"id\":7,\"method\":\"ping\"}\r\n");
    input.extend_from_slice(b"{\"jsonrpc\":\"2.0\",\"id\":8,\"method\":\"ping\"}");
    let responses = run(&mut nexus_server(), input);
    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0]["id"], 7);
    assert_eq!(responses[1]["id"], 8);
}
