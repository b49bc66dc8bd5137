//! External editor round trip
//!
//! A pane's text is written to a file under the backup root, with a
//! sentinel first line holding a timestamp slightly in the future:
//!
//! ```text
//! <!-- File modified by anki: 2024-05-01 12:00:03 -->
//! ```
//!
//! (`/* ... */` for stylesheets). An external program edits the file;
//! a later modification time than the stamp, or a first line that no
//! longer matches the editor's, means the file changed and can be
//! loaded back.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::{Duration, Local, NaiveDateTime};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::host::Pane;

/// Text every sentinel line carries
pub const SENTINEL_MARKER: &str = "File modified by anki:";

/// Timestamp format inside the sentinel line
pub const SENTINEL_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Timestamp format in backup copy names
const BACKUP_TIME_FORMAT: &str = "%Y-%m-%d %H_%M_%S";

/// Chars of context kept on each side of the cursor across a reload
const CURSOR_CONTEXT: usize = 80;

/// Strip characters that are unsafe in file names
///
/// `( ) .` become `_`; with `keep_last_dot` the last dot survives as the
/// extension separator.
pub fn sanitize_filename(name: &str, keep_last_dot: bool) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !matches!(c, '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|') && *c > '\u{1f}')
        .collect();
    let underscore = |s: &str| s.replace(['(', ')', '.'], "_");

    let sanitized = match cleaned.rsplit_once('.') {
        Some((stem, ext)) if keep_last_dot => format!("{}.{}", underscore(stem), underscore(ext)),
        _ => underscore(&cleaned),
    };
    sanitized.trim().to_string()
}

/// Template name with a trailing `_cardN` removed
///
/// Every card of a set shares one stylesheet, so its file is named after
/// the set's templates rather than one card.
pub fn shared_style_name(template_name: &str) -> &str {
    if let Some(idx) = template_name.rfind("_card") {
        let digits = &template_name[idx + 5..];
        if (1..=3).contains(&digits.len()) && digits.bytes().all(|b| b.is_ascii_digit()) {
            return &template_name[..idx];
        }
    }
    template_name
}

fn pane_stem(pane: Pane) -> &'static str {
    match pane {
        Pane::Front => "_front",
        Pane::Back => "_back",
        Pane::Style => "_style",
    }
}

fn pane_extension(pane: Pane) -> &'static str {
    if pane.is_style() {
        "css"
    } else {
        "html"
    }
}

/// The template pane a file belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target<'a> {
    /// Template-set name
    pub set_name: &'a str,
    /// Card template name
    pub template_name: &'a str,
    pub pane: Pane,
}

impl Target<'_> {
    fn base_name(&self) -> &str {
        let name = if self.template_name.is_empty() {
            "template"
        } else {
            self.template_name
        };
        if self.pane.is_style() {
            shared_style_name(name)
        } else {
            name
        }
    }
}

/// Sentinel first line stamped with `time`
pub fn sentinel_line(pane: Pane, time: NaiveDateTime) -> String {
    let stamp = time.format(SENTINEL_TIME_FORMAT);
    if pane.is_style() {
        format!("/* {} {} */", SENTINEL_MARKER, stamp)
    } else {
        format!("<!-- {} {} -->", SENTINEL_MARKER, stamp)
    }
}

pub fn has_sentinel(line: &str) -> bool {
    line.contains(SENTINEL_MARKER)
}

/// Timestamp carried by a sentinel line
pub fn parse_sentinel_time(line: &str) -> Result<NaiveDateTime> {
    let bad = || Error::BadTimestamp(line.trim().to_string());
    let (_, after) = line.split_once(SENTINEL_MARKER).ok_or_else(bad)?;
    let mut words = after.split_whitespace();
    let (date, time) = (words.next().ok_or_else(bad)?, words.next().ok_or_else(bad)?);
    NaiveDateTime::parse_from_str(&format!("{} {}", date, time), SENTINEL_TIME_FORMAT)
        .map_err(|_| bad())
}

fn first_line(text: &str) -> &str {
    text.split('\n').next().unwrap_or("")
}

/// Text with a byte cursor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stamped {
    pub text: String,
    pub cursor: usize,
}

/// Replace (or insert) the sentinel line, stamped three seconds ahead
pub fn stamp_text(text: &str, cursor: usize, pane: Pane, now: NaiveDateTime) -> Stamped {
    let sentinel = sentinel_line(pane, now + Duration::seconds(3));
    let mut body = text;
    let mut cursor = cursor.min(text.len());

    match text.find('\n') {
        Some(newline) if has_sentinel(&text[..newline]) => {
            body = &text[newline + 1..];
            cursor = cursor.saturating_sub(newline + 1);
        }
        None if has_sentinel(text) => {
            body = "";
            cursor = 0;
        }
        _ => {}
    }

    Stamped {
        text: format!("{}\n{}", sentinel, body),
        cursor: cursor + sentinel.len() + 1,
    }
}

/// 1-based line and column (in chars) of a byte offset
pub fn line_column(text: &str, cursor: usize) -> (usize, usize) {
    let cursor = floor_boundary(text, cursor);
    let before = &text[..cursor];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    (line, before[line_start..].chars().count() + 1)
}

fn floor_boundary(text: &str, pos: usize) -> usize {
    let mut pos = pos.min(text.len());
    while !text.is_char_boundary(pos) {
        pos -= 1;
    }
    pos
}

/// Fill `{file}`, `{line}` and `{column}` in a command template
pub fn expand_command(template: &str, file: &Path, line: usize, column: usize) -> String {
    template
        .replace("{file}", &file.display().to_string())
        .replace("{line}", &line.to_string())
        .replace("{column}", &column.to_string())
}

/// Split a command line into words the way a POSIX shell would
///
/// Handles single quotes, double quotes and backslash escapes; no
/// expansion of any kind is done.
pub fn split_command(command: &str) -> Result<Vec<String>> {
    let mut words = Vec::new();
    let mut word = String::new();
    let mut in_word = false;
    let mut chars = command.chars();

    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut word));
                    in_word = false;
                }
            }
            '\'' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(c) => word.push(c),
                        None => return Err(Error::Message("unterminated single quote".into())),
                    }
                }
            }
            '"' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(c @ ('"' | '\\' | '$' | '`')) => word.push(c),
                            Some('\n') => {}
                            Some(c) => {
                                word.push('\\');
                                word.push(c);
                            }
                            None => return Err(Error::Message("unterminated double quote".into())),
                        },
                        Some(c) => word.push(c),
                        None => return Err(Error::Message("unterminated double quote".into())),
                    }
                }
            }
            '\\' => {
                in_word = true;
                match chars.next() {
                    Some('\n') | None => {}
                    Some(c) => word.push(c),
                }
            }
            c => {
                in_word = true;
                word.push(c);
            }
        }
    }
    if in_word {
        words.push(word);
    }
    if words.is_empty() {
        return Err(Error::EmptyCommand);
    }
    Ok(words)
}

/// Start a program without waiting for it
pub fn launch(argv: &[String]) -> Result<()> {
    let (program, args) = argv.split_first().ok_or(Error::EmptyCommand)?;
    Command::new(program)
        .args(args)
        .spawn()
        .map_err(|source| Error::EditorLaunch {
            program: program.clone(),
            source,
        })?;
    debug!(program = %program, "external editor launched");
    Ok(())
}

/// Result of handing a pane to the external editor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opened {
    /// Stamped text the editor should now show
    pub stamped: Stamped,
    pub path: PathBuf,
    pub line: usize,
    pub column: usize,
    pub argv: Vec<String>,
}

/// How a round-trip file compares to the editor text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staleness {
    /// No file on disk
    Missing,
    /// The file or the editor text has no sentinel line
    NoSentinel,
    /// Nothing changed externally
    Fresh,
    /// The file was changed outside the editor
    Modified,
}

/// Result of saving a pane with a backup copy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Saved {
    pub stamped: Stamped,
    pub backup: PathBuf,
    /// Round-trip file, written only when the text carries a sentinel
    pub main: Option<PathBuf>,
}

/// File locations and the command used for round trips
#[derive(Debug, Clone)]
pub struct ExternalEditor {
    root: PathBuf,
    command: String,
}

impl ExternalEditor {
    pub fn new(root: impl Into<PathBuf>, command: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            command: command.into(),
        }
    }

    /// `<home>/<backup_dir_name>` with the configured command
    pub fn from_config(config: &crate::config::Config) -> Option<Self> {
        let home = dirs::home_dir()?;
        Some(Self::new(
            home.join(&config.backup_dir_name),
            config.external_editor.clone(),
        ))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn set_dir(&self, set_name: &str) -> PathBuf {
        let set_dir = sanitize_filename(set_name, false);
        if set_dir.is_empty() {
            self.root.clone()
        } else {
            self.root.join(set_dir)
        }
    }

    /// Round-trip file of a pane
    pub fn file_path(&self, target: &Target) -> PathBuf {
        let name = format!(
            "{}{}.{}",
            target.base_name(),
            pane_stem(target.pane),
            pane_extension(target.pane)
        );
        self.set_dir(target.set_name).join(sanitize_filename(&name, true))
    }

    /// Timestamped backup copy of a pane, directly under the root
    pub fn backup_copy_path(&self, target: &Target, now: NaiveDateTime) -> PathBuf {
        let name = format!(
            "{}{} {}.{}",
            target.base_name(),
            pane_stem(target.pane),
            now.format(BACKUP_TIME_FORMAT),
            pane_extension(target.pane)
        );
        self.root.join(sanitize_filename(&name, true))
    }

    /// Stamp the text, write it out and build the editor command
    ///
    /// Nothing is launched here; pass `argv` to [`launch`].
    pub fn prepare(&self, text: &str, cursor: usize, target: &Target, now: NaiveDateTime) -> Result<Opened> {
        let stamped = stamp_text(text, cursor, target.pane, now);
        let path = self.file_path(target);
        write_creating_dirs(&path, &stamped.text)?;

        let (line, column) = line_column(&stamped.text, stamped.cursor);
        let argv = split_command(&expand_command(&self.command, &path, line, column))?;
        debug!(path = %path.display(), line, column, "round-trip file written");
        Ok(Opened {
            stamped,
            path,
            line,
            column,
            argv,
        })
    }

    /// Write the round-trip file and launch the external editor
    ///
    /// A launch failure is returned after the file is written, so the
    /// caller can still show the stamped text.
    pub fn open(&self, text: &str, cursor: usize, target: &Target, now: NaiveDateTime) -> (Option<Opened>, Result<()>) {
        match self.prepare(text, cursor, target, now) {
            Ok(opened) => {
                let launched = launch(&opened.argv);
                (Some(opened), launched)
            }
            Err(e) => (None, Err(e)),
        }
    }

    /// Compare the pane's round-trip file against the editor text
    pub fn check_staleness(&self, editor_text: &str, target: &Target) -> Staleness {
        check_staleness(editor_text, &self.file_path(target))
    }

    /// Write a backup copy; restamp and write the round-trip file when
    /// the text carries a sentinel
    pub fn save_with_backup(&self, text: &str, cursor: usize, target: &Target, now: NaiveDateTime) -> Result<Saved> {
        let backup = self.backup_copy_path(target, now);

        if !has_sentinel(first_line(text)) || !text.contains('\n') {
            write_creating_dirs(&backup, text)?;
            return Ok(Saved {
                stamped: Stamped {
                    text: text.to_string(),
                    cursor,
                },
                backup,
                main: None,
            });
        }

        let stamped = stamp_text(text, cursor, target.pane, now);
        let main = self.file_path(target);
        write_creating_dirs(&backup, &stamped.text)?;
        write_creating_dirs(&main, &stamped.text)?;
        Ok(Saved {
            stamped,
            backup,
            main: Some(main),
        })
    }
}

fn write_creating_dirs(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)?;
    Ok(())
}

/// Compare a round-trip file against the editor text
///
/// A sentinel timestamp that cannot be parsed counts as unchanged.
pub fn check_staleness(editor_text: &str, path: &Path) -> Staleness {
    let contents = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => return Staleness::Missing,
    };
    let file_first = first_line(&contents);
    let editor_first = first_line(editor_text);
    if !has_sentinel(file_first) || !has_sentinel(editor_first) {
        return Staleness::NoSentinel;
    }
    if file_first.trim() != editor_first.trim() {
        return Staleness::Modified;
    }

    let stamped = match parse_sentinel_time(file_first) {
        Ok(t) => t,
        Err(e) => {
            debug!(error = %e, "ignoring sentinel");
            return Staleness::Fresh;
        }
    };
    match modified_time(path) {
        Some(mtime) if mtime > stamped => Staleness::Modified,
        Some(_) => Staleness::Fresh,
        None => {
            warn!(path = %path.display(), "no modification time available");
            Staleness::Fresh
        }
    }
}

fn modified_time(path: &Path) -> Option<NaiveDateTime> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    Some(chrono::DateTime::<Local>::from(modified).naive_local())
}

/// Load a round-trip file back into the editor
///
/// The file's sentinel is restamped two seconds ahead (and written
/// back) and the cursor is relocated by searching for the text that
/// surrounded it.
pub fn reload_from_file(
    editor_text: &str,
    cursor: usize,
    path: &Path,
    pane: Pane,
    now: NaiveDateTime,
) -> Result<Stamped> {
    if !path.exists() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }
    let contents = fs::read_to_string(path)?;
    let (file_first, rest) = contents.split_once('\n').unwrap_or((contents.as_str(), ""));
    if !has_sentinel(file_first) {
        return Err(Error::MissingSentinel(path.to_path_buf()));
    }

    let new_text = format!("{}\n{}", sentinel_line(pane, now + Duration::seconds(2)), rest);
    fs::write(path, &new_text)?;

    let cursor = relocate_cursor(editor_text, cursor, &new_text);
    debug!(path = %path.display(), cursor, "reloaded from external file");
    Ok(Stamped {
        text: new_text,
        cursor,
    })
}

/// Where `cursor` in `old` most likely ended up in `new`
///
/// Looks for the 80 chars before the cursor, then the 80 after; falls
/// back to the old offset.
pub fn relocate_cursor(old: &str, cursor: usize, new: &str) -> usize {
    let cursor = floor_boundary(old, cursor);
    let before_start = old[..cursor]
        .char_indices()
        .rev()
        .take(CURSOR_CONTEXT)
        .last()
        .map_or(cursor, |(i, _)| i);
    let before = &old[before_start..cursor];
    let after_end = old[cursor..]
        .char_indices()
        .nth(CURSOR_CONTEXT)
        .map_or(old.len(), |(i, _)| cursor + i);
    let after = &old[cursor..after_end];

    if !before.is_empty() {
        if let Some(idx) = new.find(before) {
            return idx + before.len();
        }
    }
    if !after.is_empty() {
        if let Some(idx) = new.find(after) {
            return idx;
        }
    }
    floor_boundary(new, cursor)
}

/// Read any file chosen by the user
pub fn load_file(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }
    Ok(fs::read_to_string(path)?)
}
