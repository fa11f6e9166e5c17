/*!
A stdio tool server for Nexus Dashboard developer reference content.

ndtools speaks the Model Context Protocol (MCP) over standard input and output:
newline-delimited JSON-RPC 2.0, one client per process. It exposes a small, fixed
set of tools that return example payloads, example controller responses and
markdown references for the Nexus Dashboard (ND / NDFC) REST API, plus a few
resources and a prompt built on the same content.

# Overview

The crate is a tool registry and a dispatch engine with the Nexus Dashboard
catalog declared on top of it:

- **Content** ([`content`]) supplies the reference files, either compiled into
  the binary or read from a directory that overrides them.
- **Tools** ([`mcp::tools`]) are declared once at startup with typed parameters
  and frozen into an immutable registry.
- **Dispatch** ([`mcp::dispatch`]) resolves a tool by name, binds and validates
  the arguments, runs the handler and captures the outcome.
- **Framing** ([`wire`]) and **encoding** ([`codec`]) move JSON-RPC messages in
  and out, one line per message.
- **The server loop** ([`server`]) ties it together, strictly one request at a
  time, and drains cleanly on end of input or SIGINT/SIGTERM.

No async runtime is involved. The only extra thread is the stdin reader.

# Quick Start

```
use ndtools::mcp::tools::{Arguments, Parameter, ParamType, ReturnType, ToolDescriptor, ToolOutput};
use ndtools::mcp::{Catalog, ServerInfo, Service};
use ndtools::content::EmbeddedContent;
use ndtools::server::Server;
use ndtools::wire::FrameReader;
use std::sync::Arc;

let mut tools = ndtools::mcp::tools::ToolRegistry::builder();
tools.register(
    ToolDescriptor::new("echo", "Echoes its input", ReturnType::Text, |args: &Arguments| {
        Ok(ToolOutput::Text(args.str("text").unwrap_or_default().to_string()))
    })
    .with_parameter(Parameter::required("text", ParamType::String, "Text to echo")),
).unwrap();

let catalog = Catalog { tools: tools.build(), ..Catalog::default() };
let service = Service::new(ServerInfo::new("example"), catalog, Arc::new(EmbeddedContent));

let input = br#"{"jsonrpc":"2.0","id":"1","method":"tools/call","params":{"name":"echo","arguments":{"text":"hi"}}}"#;
let mut inbox = FrameReader::new(&input[..], 1 << 20);
let mut output = Vec::new();
Server::new(service).serve(&mut inbox, &mut output).unwrap();

let response: serde_json::Value = serde_json::from_slice(&output).unwrap();
assert_eq!(response["result"]["content"][0]["text"], "hi");
```

# Error Handling

Nothing a client sends stops the loop. Every request gets exactly one response
with the same `id`; failures carry their [`error::ErrorKind`] in
`error.data.kind`. A frame that cannot be parsed is answered with a `null` id
unless a usable id could be recovered. Only startup problems (a duplicate tool
name, bad configuration) and broken stdio streams end the process.

# Module Organization

- [`content`] - Reference content providers
- [`mcp`] - Method routing, tools, resources and prompts
- [`nexus`] - The Nexus Dashboard catalog
- [`jrpc`] - JSON-RPC envelope types
- [`codec`] - Frame decoding and response encoding
- [`wire`] - Newline framing and the stdin reader
- [`server`] - The request loop and its lifecycle
- [`config`] - Flags and environment
- [`signal`] - SIGINT/SIGTERM handling
*/
pub mod codec;
pub mod config;
pub mod content;
pub mod error;
pub mod jrpc;
pub mod mcp;
pub mod nexus;
pub mod server;
pub mod signal;
pub mod wire;
