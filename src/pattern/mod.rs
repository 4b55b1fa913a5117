//! # Pattern Module
//!
//! Compilation and matching of rule source patterns.
//!
//! ## Overview
//!
//! Rule sources are written in a PCRE-flavored dialect: they may be wrapped in
//! a delimiter with trailing flag letters (`%^/blog$%i`), carry named captures
//! in the `(?P<name>...)` / `(?P<'name'>...)` forms, and use POSIX class
//! tokens (`[:alpha:]`, `[:digit:]`, ...). The compiler translates all of that
//! to a native [`regex::Regex`] plus an ordinal-indexed capture-name table.
//!
//! ## Two-phase approach
//!
//! 1. **Compilation**: at manifest load, every source is rewritten (named
//!    groups to plain groups, POSIX classes to Unicode-safe equivalents) and
//!    compiled. Malformed sources are fatal configuration errors.
//! 2. **Matching**: per request, a compiled pattern is applied to the current
//!    path or to a header/cookie/query value, yielding the raw group array and
//!    the shared capture-name table for template substitution.

mod cache;
mod compile;
mod matcher;
#[cfg(test)]
mod tests;

pub use cache::PatternCache;
pub use compile::CompiledPattern;
pub use matcher::{match_pcre, GroupVec, PatternMatch, MAX_INLINE_GROUPS};
