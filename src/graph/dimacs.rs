use super::Graph;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {0}: {1}")]
    Malformed(usize, String),
    #[error("missing problem line")]
    MissingHeader,
    #[error("declared {declared} edges but found {found}")]
    EdgeCountMismatch { declared: usize, found: usize },
}

/// reads the DIMACS-like text format: `p edge n m`, `e u v`, `n v c`, with
/// 1-based vertex names and `c` comment lines. `seed_permute` optionally
/// shuffles vertex names, which must not change the computed group.
pub fn parse_dimacs(
    input: &str,
    seed_permute: Option<u64>,
) -> Result<(Graph, Vec<usize>), ParseError> {
    let mut adjacency: Vec<Vec<usize>> = Vec::new();
    let mut colors: Vec<usize> = Vec::new();
    let mut reshuffle: Vec<usize> = Vec::new();
    let mut declared_edges = 0;
    let mut found_edges = 0;
    let mut have_header = false;

    for (lineno, line) in input.lines().enumerate() {
        let lineno = lineno + 1;
        let malformed = |msg: &str| ParseError::Malformed(lineno, msg.to_string());
        let mut fields = line.split_whitespace();
        match fields.next() {
            None | Some("c") => continue,
            Some("p") => {
                if have_header {
                    return Err(malformed("duplicate problem line"));
                }
                if fields.next() != Some("edge") {
                    return Err(malformed("expected `p edge n m`"));
                }
                let n: usize = parse_field(fields.next(), lineno)?;
                declared_edges = parse_field(fields.next(), lineno)?;
                adjacency = vec![Vec::new(); n];
                colors = vec![0; n];
                reshuffle = (0..n).collect();
                if let Some(seed) = seed_permute {
                    let mut rng = SmallRng::seed_from_u64(seed);
                    reshuffle.shuffle(&mut rng);
                }
                have_header = true;
            }
            Some("e") => {
                if !have_header {
                    return Err(ParseError::MissingHeader);
                }
                let u = named_vertex(fields.next(), lineno, &reshuffle)?;
                let w = named_vertex(fields.next(), lineno, &reshuffle)?;
                if u == w {
                    return Err(malformed("self-loops are not supported"));
                }
                adjacency[u].push(w);
                adjacency[w].push(u);
                found_edges += 1;
            }
            Some("n") => {
                if !have_header {
                    return Err(ParseError::MissingHeader);
                }
                let v = named_vertex(fields.next(), lineno, &reshuffle)?;
                let c: usize = parse_field(fields.next(), lineno)?;
                colors[v] = c;
            }
            Some(_) => return Err(malformed("unknown line type")),
        }
    }

    if !have_header {
        return Err(ParseError::MissingHeader);
    }
    if found_edges != declared_edges {
        return Err(ParseError::EdgeCountMismatch {
            declared: declared_edges,
            found: found_edges,
        });
    }
    Ok((Graph::from_adjacency(&adjacency), colors))
}

pub fn read_dimacs_file<P: AsRef<Path>>(
    path: P,
    seed_permute: Option<u64>,
) -> Result<(Graph, Vec<usize>), ParseError> {
    let input = std::fs::read_to_string(path)?;
    parse_dimacs(&input, seed_permute)
}

fn parse_field(field: Option<&str>, lineno: usize) -> Result<usize, ParseError> {
    field
        .and_then(|f| f.parse().ok())
        .ok_or_else(|| ParseError::Malformed(lineno, "expected a number".to_string()))
}

fn named_vertex(
    field: Option<&str>,
    lineno: usize,
    reshuffle: &[usize],
) -> Result<usize, ParseError> {
    let name = parse_field(field, lineno)?;
    if name == 0 || name > reshuffle.len() {
        return Err(ParseError::Malformed(
            lineno,
            format!("vertex {name} out of range"),
        ));
    }
    Ok(reshuffle[name - 1])
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRIANGLE: &str = "c a triangle\np edge 3 3\ne 1 2\ne 2 3\ne 1 3\nn 2 1\n";

    #[test]
    fn parses_triangle_with_color() {
        let (g, colors) = parse_dimacs(TRIANGLE, None).unwrap();
        assert_eq!(g.vertex_count(), 3);
        assert_eq!(g.edge_count(), 6);
        assert_eq!(colors, vec![0, 1, 0]);
        assert!(g.sanity_check());
    }

    #[test]
    fn permuted_parse_is_still_sane() {
        let (g, colors) = parse_dimacs(TRIANGLE, Some(7)).unwrap();
        assert!(g.sanity_check());
        assert_eq!(colors.iter().filter(|&&c| c == 1).count(), 1);
    }

    #[test]
    fn rejects_missing_header() {
        assert!(matches!(
            parse_dimacs("e 1 2\n", None),
            Err(ParseError::MissingHeader)
        ));
    }

    #[test]
    fn rejects_loops_and_bad_counts() {
        assert!(matches!(
            parse_dimacs("p edge 2 1\ne 1 1\n", None),
            Err(ParseError::Malformed(2, _))
        ));
        assert!(matches!(
            parse_dimacs("p edge 2 2\ne 1 2\n", None),
            Err(ParseError::EdgeCountMismatch { .. })
        ));
    }

    #[test]
    fn reads_from_file() {
        use std::io::Write;
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(TRIANGLE.as_bytes()).unwrap();
        let (g, _) = read_dimacs_file(f.path(), None).unwrap();
        assert_eq!(g.vertex_count(), 3);
    }
}
