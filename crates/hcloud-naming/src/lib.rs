//! hcloud-naming — server name templates.
//!
//! Compiles a user-supplied template into a reusable [`NameTemplate`] that
//! produces server names from a [`NameContext`]. The syntax is the subset of
//! Go `text/template` that operators already write for this provider:
//!
//! ```text
//! {{ toUpper .GroupId }}-{{ .Seq }}
//! {{ .GroupId | trimSuffix "-pool" }}-{{ .Random }}
//! {{ if hasPrefix .GroupId "gpu" }}g{{ else }}c{{ end }}-{{ .Seq }}
//! ```
//!
//! Only a fixed catalog of pure string functions is callable (see
//! [`function_names`]); nothing takes a callback, so rendering is
//! side-effect-free and always terminates. Unknown functions, unknown
//! fields and statically-wrong argument types are compile errors.

mod error;
mod funcs;
mod hostname;
mod lex;
mod parse;
mod template;
mod value;

pub use error::{TemplateError, TemplateResult};
pub use funcs::function_names;
pub use hostname::validate_server_name;
pub use template::{NameContext, NameTemplate};
