//! Serialized AST files (`.nfut`).
//!
//! The format is a magic/version header followed by the JSON encoding of the
//! statement list. Consumers only need to read files they wrote themselves;
//! any header mismatch is rejected outright.

use std::{fs, path::Path};

use crate::{
    ast::Stmt,
    diagnostics::{Diagnostic, ErrorKind, NumFuError, Result},
};

const MAGIC: &[u8] = b"NFUT1\n";

pub fn is_tree_file(bytes: &[u8]) -> bool {
    bytes.starts_with(&MAGIC[..4])
}

pub fn encode(stmts: &[Stmt]) -> Result<Vec<u8>> {
    let body = serde_json::to_vec(stmts).map_err(|err| {
        NumFuError::from(Diagnostic::new(
            ErrorKind::Value,
            format!("cannot serialize syntax tree: {err}"),
        ))
    })?;
    let mut out = Vec::with_capacity(MAGIC.len() + body.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&body);
    Ok(out)
}

pub fn decode(bytes: &[u8]) -> Result<Vec<Stmt>> {
    let body = bytes.strip_prefix(MAGIC).ok_or_else(|| {
        NumFuError::from(Diagnostic::new(
            ErrorKind::Syntax,
            "unsupported syntax tree file version",
        ))
    })?;
    serde_json::from_slice(body).map_err(|err| {
        NumFuError::from(Diagnostic::new(
            ErrorKind::Syntax,
            format!("malformed syntax tree file: {err}"),
        ))
    })
}

pub fn write(path: &Path, stmts: &[Stmt]) -> Result<()> {
    fs::write(path, encode(stmts)?)?;
    Ok(())
}
