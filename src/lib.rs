// Library root
// ------------
// Client and tooling for the GPT-4 proxy API. The binary (`main.rs`) wires
// these modules into an interactive terminal tool.
//
// Module responsibilities:
// - `model`: JSON shapes of chat/upload requests and responses, and the
//   records of an image manifest.
// - `api`: blocking HTTP client with one method per endpoint flow.
// - `batch`: runs a JSON-lines file of records against the chat API and
//   writes back answers or per-record errors.
// - `download`: naming and saving of files linked from chat responses.
// - `manifest`: directory scan that writes a JSON-lines image manifest.
// - `config`: environment configuration and access-token persistence.
// - `ui`: terminal menu that drives every flow.
pub mod api;
pub mod batch;
pub mod config;
pub mod download;
pub mod manifest;
pub mod model;
pub mod ui;
