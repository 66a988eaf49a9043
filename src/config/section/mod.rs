//! Configuration section definitions.
//!
//! Each module corresponds to a section in `nsreload.toml`:
//!
//! | Module   | TOML Section | Purpose                                  |
//! |----------|--------------|------------------------------------------|
//! | `server` | `[server]`   | WebSocket server, debounce, served root  |
//! | `build`  | `[build]`    | Compiler paths and build command         |
//! | `assets` | `[assets]`   | Stylesheet polling                       |

mod assets;
mod build;
mod server;

pub use assets::AssetsConfig;
pub use build::BuildConfig;
pub use server::ServerConfig;
