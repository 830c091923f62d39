use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::ParseError;
use crate::math::Point3;
use crate::mesh::ConvexHull;
use crate::solver::SolverOutputs;

/// Parses solver output files into an ordered list of convex hulls.
///
/// Both layouts are handled: a single file with one `o` section per hull,
/// or one file per hull. Every hull must have vertices and faces, and faces
/// may only reference vertices of their own section.
///
/// Ordering: if every section name ends in a distinct number, hulls are
/// ordered by that number; otherwise sections keep file order. Per-hull
/// files arrive already ordered.
pub struct ParseHulls<'a> {
    outputs: &'a SolverOutputs,
}

impl<'a> ParseHulls<'a> {
    /// Creates a new `ParseHulls` operation.
    #[must_use]
    pub fn new(outputs: &'a SolverOutputs) -> Self {
        Self { outputs }
    }

    /// Executes the parse, returning hulls indexed `0..n` in solver order.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] for unreadable files, malformed records,
    /// out-of-range face indices, empty hulls, or an empty hull list.
    pub fn execute(&self) -> Result<Vec<ConvexHull>, ParseError> {
        self.check_numbering()?;
        let mut sections = Vec::new();
        for path in &self.outputs.files {
            let file_sections = parse_file(path)?;
            if self.outputs.per_hull && file_sections.len() != 1 {
                return Err(ParseError::new(
                    path,
                    None,
                    format!("expected one hull per file, found {}", file_sections.len()),
                ));
            }
            sections.extend(file_sections);
        }

        let Some(first) = self.outputs.files.first() else {
            return Err(ParseError::new(PathBuf::new(), None, "solver produced no output files"));
        };
        if sections.is_empty() {
            return Err(ParseError::new(first, None, "output contains no hulls"));
        }

        if !self.outputs.per_hull {
            order_by_name(&mut sections);
        }

        let hulls: Vec<ConvexHull> = sections
            .into_iter()
            .enumerate()
            .map(|(index, s)| ConvexHull {
                index,
                vertices: s.vertices,
                triangles: s.triangles,
            })
            .collect();
        debug!(hulls = hulls.len(), "parsed solver output");
        Ok(hulls)
    }
}

impl ParseHulls<'_> {
    /// Per-hull files must be numbered `0..n`; a gap means a hull was lost.
    fn check_numbering(&self) -> Result<(), ParseError> {
        let mut expected = 0u64;
        for (&number, path) in self.outputs.numbers.iter().zip(&self.outputs.files) {
            if number != expected {
                return Err(ParseError::new(
                    path,
                    None,
                    format!("hull file {expected} is missing before hull file {number}"),
                ));
            }
            expected += 1;
        }
        Ok(())
    }
}

/// One `o` section of an OBJ file.
#[derive(Debug)]
struct Section {
    name: Option<String>,
    vertices: Vec<Point3>,
    triangles: Vec<[u32; 3]>,
    /// File-global index of the section's first vertex.
    first_vertex: usize,
    line: usize,
}

impl Section {
    fn new(name: Option<String>, first_vertex: usize, line: usize) -> Self {
        Self {
            name,
            vertices: Vec::new(),
            triangles: Vec::new(),
            first_vertex,
            line,
        }
    }

    fn label(&self) -> String {
        self.name
            .as_deref()
            .map_or_else(|| "<unnamed>".to_string(), |n| format!("`{n}`"))
    }
}

fn parse_file(path: &Path) -> Result<Vec<Section>, ParseError> {
    let text = fs::read_to_string(path).map_err(|e| ParseError::new(path, None, e.to_string()))?;
    let err = |line: usize, reason: String| ParseError::new(path, Some(line), reason);

    let mut sections: Vec<Section> = Vec::new();
    let mut vertex_count = 0usize;

    for (i, raw) in text.lines().enumerate() {
        let line_no = i + 1;
        let line = raw.split('#').next().unwrap_or_default().trim();
        let mut tokens = line.split_whitespace();
        let Some(keyword) = tokens.next() else {
            continue;
        };

        match keyword {
            "o" => {
                let name = tokens.collect::<Vec<_>>().join(" ");
                let name = (!name.is_empty()).then_some(name);
                sections.push(Section::new(name, vertex_count, line_no));
            }
            "v" => {
                let coords = tokens
                    .take(3)
                    .map(str::parse::<f64>)
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| err(line_no, format!("malformed vertex record: {e}")))?;
                let [x, y, z] = coords[..] else {
                    return Err(err(line_no, "vertex record needs three coordinates".into()));
                };
                current(&mut sections, vertex_count, line_no)
                    .vertices
                    .push(Point3::new(x, y, z));
                vertex_count += 1;
            }
            "f" => {
                let section = current(&mut sections, vertex_count, line_no);
                let mut corners = Vec::new();
                for token in tokens {
                    let global = resolve_index(token, vertex_count)
                        .map_err(|reason| err(line_no, reason))?;
                    let local = global
                        .checked_sub(section.first_vertex)
                        .filter(|&l| l < section.vertices.len())
                        .ok_or_else(|| {
                            err(
                                line_no,
                                format!(
                                    "face references vertex {} outside hull {}",
                                    global + 1,
                                    section.label()
                                ),
                            )
                        })?;
                    corners.push(u32::try_from(local).map_err(|e| err(line_no, e.to_string()))?);
                }
                if corners.len() < 3 {
                    return Err(err(line_no, "face record needs at least three vertices".into()));
                }
                // Hull faces are convex, so a fan is exact.
                for k in 1..corners.len() - 1 {
                    section.triangles.push([corners[0], corners[k], corners[k + 1]]);
                }
            }
            // Normals, texture coordinates, groups, smoothing and materials
            // carry nothing a collision hull needs.
            _ => {}
        }
    }

    for section in &sections {
        if section.vertices.is_empty() {
            return Err(err(section.line, format!("hull {} has no vertices", section.label())));
        }
        if section.triangles.is_empty() {
            return Err(err(section.line, format!("hull {} has no faces", section.label())));
        }
    }
    Ok(sections)
}

/// Returns the open section, starting an unnamed one for records before any `o`.
fn current(sections: &mut Vec<Section>, vertex_count: usize, line: usize) -> &mut Section {
    if sections.is_empty() {
        sections.push(Section::new(None, vertex_count, line));
    }
    let last = sections.len() - 1;
    &mut sections[last]
}

/// Converts an OBJ face token (`v`, `v/vt`, `v//vn`, `v/vt/vn`) to a 0-based
/// file-global vertex index.
fn resolve_index(token: &str, vertex_count: usize) -> Result<usize, String> {
    let head = token.split('/').next().unwrap_or_default();
    let raw: i64 = head
        .parse()
        .map_err(|_| format!("malformed face index `{token}`"))?;
    let count = i64::try_from(vertex_count).map_err(|e| e.to_string())?;
    let index = match raw {
        0 => return Err("face index 0 is invalid".into()),
        r if r > 0 => r - 1,
        r => count + r,
    };
    if index < 0 || index >= count {
        return Err(format!(
            "face index {raw} out of range ({vertex_count} vertices defined so far)"
        ));
    }
    usize::try_from(index).map_err(|e| e.to_string())
}

/// Sorts sections by a trailing number in their names when every section
/// carries a distinct one.
fn order_by_name(sections: &mut [Section]) {
    let numbers: Option<Vec<u64>> = sections
        .iter()
        .map(|s| s.name.as_deref().and_then(trailing_number))
        .collect();
    let Some(mut keys) = numbers else {
        return;
    };
    keys.sort_unstable();
    if keys.windows(2).any(|w| w[0] == w[1]) {
        return;
    }
    sections.sort_by_key(|s| s.name.as_deref().and_then(trailing_number));
}

fn trailing_number(name: &str) -> Option<u64> {
    let digits_at = name
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i)?;
    name[digits_at..].parse().ok()
}
