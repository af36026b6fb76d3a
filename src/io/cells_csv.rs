// cell parameter CSV: `file,name,x,y,z,radius`, one row per cell.
// fields containing a comma or quote are quoted; "" escapes a quote.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;

use log::warn;

use crate::cell::{CellParams, Sphere};
use crate::error::{CellverseError, Result};

pub const CELLS_CSV_HEADER: &str = "file,name,x,y,z,radius";

/// Write rows sorted by (file, name).
pub fn write_cells_csv(path: &Path, mut rows: Vec<CellParams>) -> Result<()> {
    profiling::scope!("write_cells_csv");
    rows.sort_by(|a, b| (&a.file, &a.name).cmp(&(&b.file, &b.name)));

    let mut out = String::with_capacity(32 * (rows.len() + 1));
    out.push_str(CELLS_CSV_HEADER);
    out.push('\n');
    for r in &rows {
        // writing into a String cannot fail
        let _ = writeln!(
            out,
            "{},{},{},{},{},{}",
            quote(&r.file),
            quote(&r.name),
            r.x,
            r.y,
            r.z,
            r.radius
        );
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| CellverseError::io(parent, e))?;
    }
    std::fs::write(path, out).map_err(|e| CellverseError::io(path, e))
}

/// Read seed cells grouped by their `file` column, in row order.
/// A header row is optional. Blank lines are skipped; malformed rows are errors.
pub fn read_cells_csv(path: &Path) -> Result<HashMap<String, Vec<Sphere>>> {
    profiling::scope!("read_cells_csv");
    let text = std::fs::read_to_string(path).map_err(|e| CellverseError::io(path, e))?;

    let mut cells: HashMap<String, Vec<Sphere>> = HashMap::new();
    for (i, line) in text.lines().enumerate() {
        let line_no = i + 1;
        let line = line.trim();
        if line.is_empty() || (line_no == 1 && line.eq_ignore_ascii_case(CELLS_CSV_HEADER)) {
            continue;
        }

        let row = parse_row(line).map_err(|reason| CellverseError::Csv {
            path: path.to_path_buf(),
            line: line_no,
            reason,
        })?;
        if row.radius < 0.0 {
            warn!("{}:{line_no}: negative radius for cell {}", path.display(), row.name);
        }
        cells.entry(row.file.clone()).or_default().push(row.into_sphere());
    }
    Ok(cells)
}

fn parse_row(line: &str) -> std::result::Result<CellParams, String> {
    let fields = split_fields(line)?;
    if fields.len() != 6 {
        return Err(format!("expected 6 fields, found {}", fields.len()));
    }
    let num = |idx: usize, what: &str| -> std::result::Result<f32, String> {
        fields[idx]
            .trim()
            .parse::<f32>()
            .map_err(|_| format!("{what} is not a number: {:?}", fields[idx]))
    };
    Ok(CellParams {
        file: fields[0].clone(),
        name: fields[1].clone(),
        x: num(2, "x")?,
        y: num(3, "y")?,
        z: num(4, "z")?,
        radius: num(5, "radius")?,
    })
}

fn split_fields(line: &str) -> std::result::Result<Vec<String>, String> {
    let mut fields = Vec::new();
    let mut cur = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match (c, in_quotes) {
            ('"', true) if chars.peek() == Some(&'"') => {
                cur.push('"');
                chars.next();
            }
            ('"', true) => in_quotes = false,
            ('"', false) if cur.is_empty() => in_quotes = true,
            (',', false) => fields.push(std::mem::take(&mut cur)),
            _ => cur.push(c),
        }
    }
    if in_quotes {
        return Err("unterminated quoted field".into());
    }
    fields.push(cur);
    Ok(fields)
}

fn quote(field: &str) -> String {
    if field.contains([',', '"', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(file: &str, name: &str, x: f32) -> CellParams {
        Sphere::new(name, x, 2.0, 0.0, 3.5).to_params(file)
    }

    #[test]
    fn test_rows_are_sorted_by_file_then_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cells.csv");
        write_cells_csv(
            &path,
            vec![row("b.tif", "a", 1.0), row("a.tif", "z", 2.0), row("a.tif", "c", 3.0)],
        )
        .unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], CELLS_CSV_HEADER);
        assert_eq!(lines[1], "a.tif,c,3,2,0,3.5");
        assert_eq!(lines[2], "a.tif,z,2,2,0,3.5");
        assert_eq!(lines[3], "b.tif,a,1,2,0,3.5");
    }

    #[test]
    fn test_header_only_for_no_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("cells.csv");
        write_cells_csv(&path, vec![]).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), format!("{CELLS_CSV_HEADER}\n"));
    }

    #[test]
    fn test_written_file_reads_back_grouped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cells.csv");
        write_cells_csv(
            &path,
            vec![row("dir,with comma/f0.tif", "c\"1", 1.25), row("f1.tif", "c2", 4.0)],
        )
        .unwrap();

        let cells = read_cells_csv(&path).unwrap();
        assert_eq!(cells.len(), 2);
        let f0 = &cells["dir,with comma/f0.tif"];
        assert_eq!(f0, &vec![Sphere::new("c\"1", 1.25, 2.0, 0.0, 3.5)]);
    }

    #[test]
    fn test_malformed_row_reports_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cells.csv");
        std::fs::write(&path, "file,name,x,y,z,radius\nf.tif,a,1,2,0,3\nf.tif,b,one,2,0,3\n").unwrap();
        match read_cells_csv(&path) {
            Err(CellverseError::Csv { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected csv error, got {other:?}"),
        }
    }

    #[test]
    fn test_headerless_file_and_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seed.csv");
        std::fs::write(&path, "f.tif,a,1,2,0,3\n\nf.tif,b,4,5,0,6\n").unwrap();
        let cells = read_cells_csv(&path).unwrap();
        let names: Vec<&str> = cells["f.tif"].iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_split_fields_handles_quotes() {
        assert_eq!(split_fields(r#""a,b",c"#).unwrap(), vec!["a,b", "c"]);
        assert_eq!(split_fields(r#""say ""hi""",x"#).unwrap(), vec![r#"say "hi""#, "x"]);
        assert!(split_fields(r#""open,x"#).is_err());
    }
}
