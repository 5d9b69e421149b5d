//! OBJ7/OBJ8 text object parsing
//!
//! Only what the scheduler needs is kept: the texture name, LOD ranges,
//! light points per LOD and a triangle count for diagnostics. Vertex data
//! stays with the drawing backend, which re-reads the file itself.

use std::path::{Path, PathBuf};

use crate::core::types::Vec3;
use crate::core::{Error, Result};

/// Far distance of the implicit LOD used when a file declares none
pub const DEFAULT_LOD_FAR: f32 = 40_000.0;

/// What a light point represents, decoded from its magic RGB value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LightKind {
    NavRed,
    NavGreen,
    Beacon,
    Strobe,
    Landing,
    /// Plain colored light, always lit
    Other,
}

impl LightKind {
    /// OBJ7 encodes light roles as RGB 11/22/33/44/55.
    pub fn from_rgb(rgb: [i32; 3]) -> Self {
        match rgb {
            [11, 11, 11] => LightKind::NavRed,
            [22, 22, 22] => LightKind::NavGreen,
            [33, 33, 33] => LightKind::Beacon,
            [44, 44, 44] => LightKind::Strobe,
            [55, 55, 55] => LightKind::Landing,
            _ => LightKind::Other,
        }
    }

    /// OBJ8 named lights
    pub fn from_name(name: &str) -> Self {
        let name = name.to_ascii_lowercase();
        if name.contains("beacon") {
            LightKind::Beacon
        } else if name.contains("strobe") {
            LightKind::Strobe
        } else if name.contains("landing") || name.contains("taxi") {
            LightKind::Landing
        } else if name.contains("nav") && (name.contains("left") || name.contains("red")) {
            LightKind::NavRed
        } else if name.contains("nav") {
            LightKind::NavGreen
        } else {
            LightKind::Other
        }
    }
}

/// One light point in model space
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightPoint {
    pub position: Vec3,
    pub kind: LightKind,
}

/// A distance band of the object
#[derive(Clone, Debug, PartialEq)]
pub struct Lod {
    pub near: f32,
    pub far: f32,
    pub lights: Vec<LightPoint>,
    pub triangles: usize,
}

impl Lod {
    fn new(near: f32, far: f32) -> Self {
        Self { near, far, lights: Vec::new(), triangles: 0 }
    }
}

/// Parsed object file
#[derive(Clone, Debug, PartialEq)]
pub struct Geometry {
    /// Source path
    pub path: PathBuf,
    /// Format version (7 or 8)
    pub version: u32,
    /// Texture name as written in the file, if any
    pub texture: Option<String>,
    pub lods: Vec<Lod>,
}

impl Geometry {
    /// Total triangles across all LODs
    pub fn triangle_count(&self) -> usize {
        self.lods.iter().map(|lod| lod.triangles).sum()
    }

    /// Absolute path of the embedded texture (`<name>.png` next to the object).
    pub fn texture_path(&self) -> Option<PathBuf> {
        self.sibling_texture("")
    }

    /// Absolute path of the embedded night texture (`<name>_LIT.png`).
    pub fn lit_texture_path(&self) -> Option<PathBuf> {
        self.sibling_texture("_LIT")
    }

    fn sibling_texture(&self, suffix: &str) -> Option<PathBuf> {
        let name = self.texture.as_ref()?;
        let dir = self.path.parent().unwrap_or_else(|| Path::new(""));
        let base = normalize_separators(name);
        let file = if Path::new(&base).extension().is_some() {
            insert_before_extension(&base, suffix)
        } else {
            format!("{}{}.png", base, suffix)
        };
        Some(dir.join(file))
    }
}

/// Turn `\` and `:` separators into `/`.
pub fn normalize_separators(path: &str) -> String {
    path.chars()
        .map(|c| if c == '\\' || c == ':' { '/' } else { c })
        .collect()
}

/// `dir/tex.png` + `LIT` -> `dir/texLIT.png`; no extension appends.
pub fn insert_before_extension(path: &str, insert: &str) -> String {
    let name_start = path.rfind('/').map(|i| i + 1).unwrap_or(0);
    match path[name_start..].rfind('.') {
        Some(dot) => {
            let dot = name_start + dot;
            format!("{}{}{}", &path[..dot], insert, &path[dot..])
        }
        None => format!("{}{}", path, insert),
    }
}

/// Read and parse an object file
pub fn load_geometry(path: &Path) -> Result<Geometry> {
    let content = std::fs::read_to_string(path)?;
    parse_geometry(path, &content)
}

/// Parse object text
pub fn parse_geometry(path: &Path, content: &str) -> Result<Geometry> {
    let err = |message: &str| Error::Geometry {
        path: path.to_path_buf(),
        message: message.to_string(),
    };

    let mut lines = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("//") && !line.starts_with('#'));

    // Line-ending tag (I/A), then the version
    lines.next().ok_or_else(|| err("empty file"))?;
    let version_token = lines
        .next()
        .and_then(|l| l.split_whitespace().next())
        .ok_or_else(|| err("missing version"))?;

    let version = match version_token {
        "700" => 7,
        "800" => 8,
        other => return Err(err(&format!("unsupported object version {}", other))),
    };

    // Both formats carry an OBJ tag line
    match lines.next() {
        Some(tag) if tag.starts_with("OBJ") => {}
        _ => return Err(err("missing OBJ tag")),
    }

    let mut geometry = Geometry {
        path: path.to_path_buf(),
        version,
        texture: None,
        lods: Vec::new(),
    };

    if version == 7 {
        let texture = lines.next().ok_or_else(|| err("missing texture line"))?;
        let name = texture.split_whitespace().next().unwrap_or("");
        if !name.is_empty() && name != "none" {
            geometry.texture = Some(name.to_string());
        }
        parse_obj7_body(&mut lines, &mut geometry, &err)?;
    } else {
        parse_obj8_body(&mut lines, &mut geometry);
    }

    if geometry.lods.is_empty() {
        geometry.lods.push(Lod::new(0.0, DEFAULT_LOD_FAR));
    }

    Ok(geometry)
}

fn parse_f32(token: Option<&str>) -> Option<f32> {
    token.and_then(|t| t.parse::<f32>().ok())
}

fn current_lod(geometry: &mut Geometry) -> &mut Lod {
    if geometry.lods.is_empty() {
        geometry.lods.push(Lod::new(0.0, DEFAULT_LOD_FAR));
    }
    let last = geometry.lods.len() - 1;
    &mut geometry.lods[last]
}

fn parse_obj7_body<'a, I, E>(lines: &mut I, geometry: &mut Geometry, err: &E) -> Result<()>
where
    I: Iterator<Item = &'a str>,
    E: Fn(&str) -> Error,
{
    while let Some(line) = lines.next() {
        let mut tokens = line.split_whitespace();
        let Some(cmd) = tokens.next() else { continue };

        match cmd {
            "end" => break,
            "ATTR_LOD" => {
                let near = parse_f32(tokens.next()).ok_or_else(|| err("bad ATTR_LOD"))?;
                let far = parse_f32(tokens.next()).ok_or_else(|| err("bad ATTR_LOD"))?;
                geometry.lods.push(Lod::new(near, far));
            }
            "light" => {
                let data = lines.next().ok_or_else(|| err("truncated light"))?;
                let v: Vec<f32> = data.split_whitespace().filter_map(|t| t.parse().ok()).collect();
                if v.len() < 6 {
                    return Err(err("light needs xyz and rgb"));
                }
                let rgb = [v[3] as i32, v[4] as i32, v[5] as i32];
                current_lod(geometry).lights.push(LightPoint {
                    position: Vec3::new(v[0], v[1], v[2]),
                    kind: LightKind::from_rgb(rgb),
                });
            }
            "line" => skip_vertices(lines, 2, err)?,
            "tri" => {
                skip_vertices(lines, 3, err)?;
                current_lod(geometry).triangles += 1;
            }
            "quad" | "quad_hard" | "quad_cockpit" | "quad_movie" => {
                skip_vertices(lines, 4, err)?;
                current_lod(geometry).triangles += 2;
            }
            "polygon" | "tri_fan" | "tri_strip" | "quad_strip" => {
                let count = tokens
                    .next()
                    .and_then(|t| t.parse::<usize>().ok())
                    .ok_or_else(|| err("strip needs a vertex count"))?;
                skip_vertices(lines, count, err)?;
                current_lod(geometry).triangles += count.saturating_sub(2);
            }
            // Attributes and smoke puffs are single-line
            _ => {}
        }
    }
    Ok(())
}

fn skip_vertices<'a, I, E>(lines: &mut I, count: usize, err: &E) -> Result<()>
where
    I: Iterator<Item = &'a str>,
    E: Fn(&str) -> Error,
{
    for _ in 0..count {
        lines.next().ok_or_else(|| err("truncated vertex list"))?;
    }
    Ok(())
}

fn parse_obj8_body<'a, I>(lines: &mut I, geometry: &mut Geometry)
where
    I: Iterator<Item = &'a str>,
{
    for line in lines {
        let mut tokens = line.split_whitespace();
        let Some(cmd) = tokens.next() else { continue };

        match cmd {
            "TEXTURE" => {
                geometry.texture = tokens.next().map(str::to_string);
            }
            "ATTR_LOD" => {
                if let (Some(near), Some(far)) = (parse_f32(tokens.next()), parse_f32(tokens.next())) {
                    geometry.lods.push(Lod::new(near, far));
                }
            }
            "TRIS" => {
                let _offset = tokens.next();
                if let Some(count) = tokens.next().and_then(|t| t.parse::<usize>().ok()) {
                    current_lod(geometry).triangles += count / 3;
                }
            }
            "LIGHT_NAMED" => {
                let name = tokens.next().unwrap_or("");
                let xyz: Vec<f32> = tokens.filter_map(|t| t.parse().ok()).collect();
                if xyz.len() >= 3 {
                    current_lod(geometry).lights.push(LightPoint {
                        position: Vec3::new(xyz[0], xyz[1], xyz[2]),
                        kind: LightKind::from_name(name),
                    });
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OBJ7: &str = "I\n700\nOBJ\n\nB738_DAL\n\
        ATTR_LOD 0 2000\n\
        tri\n0 0 0 0 0\n1 0 0 1 0\n0 1 0 0 1\n\
        light\n1 2 3 11 11 11\n\
        light\n-1 2 3 22 22 22\n\
        ATTR_LOD 2000 40000\n\
        quad_strip 6\n0 0 0 0 0\n0 0 0 0 0\n0 0 0 0 0\n0 0 0 0 0\n0 0 0 0 0\n0 0 0 0 0\n\
        light\n0 5 0 33 33 33\n\
        end\n";

    #[test]
    fn test_parse_obj7_lods_and_lights() {
        let geometry = parse_geometry(Path::new("/csl/dal/b738.obj"), OBJ7).unwrap();
        assert_eq!(geometry.version, 7);
        assert_eq!(geometry.texture.as_deref(), Some("B738_DAL"));
        assert_eq!(geometry.lods.len(), 2);
        assert_eq!(geometry.lods[0].lights.len(), 2);
        assert_eq!(geometry.lods[0].lights[0].kind, LightKind::NavRed);
        assert_eq!(geometry.lods[0].lights[1].kind, LightKind::NavGreen);
        assert_eq!(geometry.lods[1].lights[0].kind, LightKind::Beacon);
        assert_eq!(geometry.lods[0].triangles, 1);
        assert_eq!(geometry.lods[1].triangles, 4);
        assert_eq!(geometry.triangle_count(), 5);
    }

    #[test]
    fn test_lod_ranges_are_contiguous() {
        let geometry = parse_geometry(Path::new("/x/a.obj"), OBJ7).unwrap();
        assert_eq!(geometry.lods[0].near, 0.0);
        assert_eq!(geometry.lods[0].far, geometry.lods[1].near);
        assert!(geometry.lods[1].far > 5000.0);
    }

    #[test]
    fn test_default_lod_when_none_declared() {
        let text = "A\n700\nOBJ\ntex\ntri\n0 0 0 0 0\n0 0 0 0 0\n0 0 0 0 0\nend\n";
        let geometry = parse_geometry(Path::new("/x/a.obj"), text).unwrap();
        assert_eq!(geometry.lods.len(), 1);
        assert_eq!(geometry.lods[0].far, DEFAULT_LOD_FAR);
        assert_eq!(geometry.lods[0].triangles, 1);
    }

    #[test]
    fn test_sibling_texture_paths() {
        let geometry = parse_geometry(Path::new("/csl/dal/b738.obj"), OBJ7).unwrap();
        assert_eq!(geometry.texture_path().unwrap(), PathBuf::from("/csl/dal/B738_DAL.png"));
        assert_eq!(geometry.lit_texture_path().unwrap(), PathBuf::from("/csl/dal/B738_DAL_LIT.png"));
    }

    #[test]
    fn test_parse_obj8() {
        let text = "I\n800\nOBJ\nTEXTURE body.png\nPOINT_COUNTS 3 0 0 3\n\
            VT 0 0 0 0 0 1 0 0\nTRIS 0 3\nLIGHT_NAMED airplane_beacon 0 3 0\nLIGHT_NAMED airplane_nav_left 1 1 1\n";
        let geometry = parse_geometry(Path::new("/x/part.obj"), text).unwrap();
        assert_eq!(geometry.version, 8);
        assert_eq!(geometry.texture.as_deref(), Some("body.png"));
        assert_eq!(geometry.lods[0].triangles, 1);
        assert_eq!(geometry.lods[0].lights[0].kind, LightKind::Beacon);
        assert_eq!(geometry.lods[0].lights[1].kind, LightKind::NavRed);
        assert_eq!(geometry.lit_texture_path().unwrap(), PathBuf::from("/x/body_LIT.png"));
    }

    #[test]
    fn test_rejects_bad_header() {
        assert!(parse_geometry(Path::new("a.obj"), "").is_err());
        assert!(parse_geometry(Path::new("a.obj"), "I\n2\n").is_err());
        assert!(parse_geometry(Path::new("a.obj"), "I\n700\nNOPE\n").is_err());
    }

    #[test]
    fn test_truncated_body_is_error() {
        let text = "I\n700\nOBJ\ntex\ntri\n0 0 0 0 0\n";
        assert!(matches!(
            parse_geometry(Path::new("a.obj"), text),
            Err(Error::Geometry { .. })
        ));
    }

    #[test]
    fn test_path_helpers() {
        assert_eq!(normalize_separators("PKG:sub\\a.obj"), "PKG/sub/a.obj");
        assert_eq!(insert_before_extension("dir.v2/tex.png", "LIT"), "dir.v2/texLIT.png");
        assert_eq!(insert_before_extension("dir.v2/tex", "LIT"), "dir.v2/texLIT");
    }
}
