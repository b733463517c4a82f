// Library root
// -----------
// This crate exposes the two article pipelines used by the binaries in
// `src/bin/`: `cover-creator` generates a cover image and
// `wechat-publisher` turns an article into a WeChat draft.
//
// Module responsibilities:
// - `config`: flat JSON configuration merged over defaults.
// - `error`: the `Error` type every stage reports through.
// - `layout`: conventional file names inside an article directory.
// - `article`: parser for the tagged `artical.md` format.
// - `imagegen`: chat-completions image client with model fallback.
// - `overlay`: title text drawn onto generated covers.
// - `cover`: cover pipeline tying prompt, generation and overlay together.
// - `wechat`: WeChat public-platform API client.
// - `render`: content stream to inline-styled HTML.
// - `publisher`: the six-stage publishing pipeline.
pub mod article;
pub mod config;
pub mod cover;
pub mod error;
pub mod imagegen;
pub mod layout;
pub mod overlay;
pub mod publisher;
pub mod render;
pub mod wechat;

pub use config::Config;
pub use error::{Error, Result, Stage};
