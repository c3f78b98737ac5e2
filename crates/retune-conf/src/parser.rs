//! Configuration-file parser.
//!
//! Turns a file (plus everything it transitively `include`s) into an ordered
//! [`ConfigItemList`]. The parser stops at the first error; the partially
//! built list is simply dropped. It performs no registry work at all, so the
//! reload engine can run its validation pass against a fully parsed list.

use std::fs;
use std::path::{Path, PathBuf};

use retune_core::{ConfError, ConfResult, WHITELIST_SETTING};
use tracing::debug;

use crate::lexer::{Lexer, Token, TokenKind};
use crate::quote::decode_quoted;

/// Maximum depth of the `include` chain. The root file opens at depth 0;
/// an open attempted at this depth is refused.
pub const MAX_INCLUDE_DEPTH: usize = 10;

/// One `name [=] value` line that survived parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigItem {
    /// Bare or `class.local` qualified setting name.
    pub name: String,
    /// Decoded value text.
    pub value: String,
    /// Absolute path of the file this line came from.
    pub file: PathBuf,
    /// 1-based line number within that file.
    pub line: u32,
}

/// Ordered assignment list with a distinguished head slot.
///
/// Invariant: at most one item names the class-whitelist setting, and when
/// present it sits at the head regardless of where it appeared in the file,
/// so the reload engine evaluates it before every other assignment. A later
/// occurrence replaces the head in place, keeping the newest file/line.
/// Duplicates of any other name stay in file order; the last one wins at
/// commit time.
#[derive(Debug, Default)]
pub struct ConfigItemList {
    items: Vec<ConfigItem>,
    has_whitelist_head: bool,
}

impl ConfigItemList {
    pub fn push(&mut self, item: ConfigItem) {
        if item.name.eq_ignore_ascii_case(WHITELIST_SETTING) {
            if self.has_whitelist_head {
                self.items[0] = item;
            } else {
                self.items.insert(0, item);
                self.has_whitelist_head = true;
            }
        } else {
            self.items.push(item);
        }
    }

    /// The head item when it is the class-whitelist assignment.
    #[must_use]
    pub fn whitelist_head(&self) -> Option<&ConfigItem> {
        self.has_whitelist_head.then(|| &self.items[0])
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ConfigItem> {
        self.items.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<'a> IntoIterator for &'a ConfigItemList {
    type Item = &'a ConfigItem;
    type IntoIter = std::slice::Iter<'a, ConfigItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Parse `path` and everything it includes into one assignment list.
///
/// Relative paths resolve against `calling_file`'s directory when present,
/// otherwise against `data_dir` (the root file and any includes it names
/// with no calling context).
///
/// # Errors
///
/// Returns the first [`ConfError`] hit: file access, include nesting beyond
/// [`MAX_INCLUDE_DEPTH`], or a syntax error citing file and line.
pub fn parse_config_file(
    path: &Path,
    calling_file: Option<&Path>,
    data_dir: &Path,
    depth: usize,
) -> ConfResult<ConfigItemList> {
    let mut list = ConfigItemList::default();
    parse_into(&mut list, path, calling_file, data_dir, depth)?;
    Ok(list)
}

fn resolve_path(path: &Path, calling_file: Option<&Path>, data_dir: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match calling_file.and_then(Path::parent) {
        Some(parent) => parent.join(path),
        None => data_dir.join(path),
    }
}

fn parse_into(
    list: &mut ConfigItemList,
    path: &Path,
    calling_file: Option<&Path>,
    data_dir: &Path,
    depth: usize,
) -> ConfResult<()> {
    if depth >= MAX_INCLUDE_DEPTH {
        return Err(ConfError::NestingTooDeep {
            path: path.to_path_buf(),
            depth,
        });
    }

    let resolved = resolve_path(path, calling_file, data_dir);
    let abs = resolved
        .canonicalize()
        .map_err(|source| ConfError::FileAccess {
            path: resolved.clone(),
            source,
        })?;
    let bytes = fs::read(&abs).map_err(|source| ConfError::FileAccess {
        path: abs.clone(),
        source,
    })?;
    debug!(
        target: "retune",
        file = %abs.display(),
        depth,
        "parsing configuration file"
    );

    let mut lexer = Lexer::new(&bytes);
    loop {
        let Some(name_tok) = lexer.next_token() else {
            break;
        };
        let name = match name_tok.kind {
            TokenKind::Eol => continue,
            TokenKind::Ident | TokenKind::QualifiedIdent => name_tok.text_string(),
            _ => return Err(syntax_near(&abs, &name_tok)),
        };
        let line = name_tok.line;

        // Optional equals sign between name and value.
        let mut value_tok = next_or_eol_error(&mut lexer, &abs)?;
        if value_tok.kind == TokenKind::Equals {
            value_tok = next_or_eol_error(&mut lexer, &abs)?;
        }

        let value = match value_tok.kind {
            TokenKind::QuotedString => {
                String::from_utf8_lossy(&decode_quoted(value_tok.text)).into_owned()
            }
            TokenKind::Ident
            | TokenKind::Integer
            | TokenKind::Real
            | TokenKind::UnquotedString => value_tok.text_string(),
            TokenKind::Eol => {
                return Err(ConfError::SyntaxEol {
                    file: abs.clone(),
                    line: value_tok.line,
                });
            }
            _ => return Err(syntax_near(&abs, &value_tok)),
        };

        // Expect end of line; end of file counts.
        let at_eof = match lexer.next_token() {
            None => true,
            Some(tok) if tok.kind == TokenKind::Eol => false,
            Some(tok) => return Err(syntax_near(&abs, &tok)),
        };

        if name.eq_ignore_ascii_case("include") {
            parse_into(list, Path::new(&value), Some(&abs), data_dir, depth + 1)?;
        } else {
            list.push(ConfigItem {
                name,
                value,
                file: abs.clone(),
                line,
            });
        }

        if at_eof {
            break;
        }
    }
    Ok(())
}

fn next_or_eol_error<'a>(lexer: &mut Lexer<'a>, file: &Path) -> ConfResult<Token<'a>> {
    lexer.next_token().ok_or_else(|| ConfError::SyntaxEol {
        file: file.to_path_buf(),
        line: lexer.line(),
    })
}

fn syntax_near(file: &Path, tok: &Token<'_>) -> ConfError {
    ConfError::SyntaxNear {
        file: file.to_path_buf(),
        line: tok.line,
        token: tok.text_string(),
    }
}
