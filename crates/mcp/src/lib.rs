//! Model Context Protocol downstream integration.
//!
//! `access` is the tool/server access-control resolution used when a caller's group is checked
//! against an MCP server's allow/deny rules. The downstream client and dynamic server cache are
//! not wired up yet; callers that need live MCP tool execution go through their own client until
//! that lands (see DESIGN.md).

pub mod access;
