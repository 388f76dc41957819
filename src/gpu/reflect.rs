//! Uniform-block reflection from WGSL source
//!
//! Each program stage declares its uniforms in one `struct Uniforms { ... }`
//! bound at `@group(0) @binding(0)`. Member offsets follow the WGSL layout
//! rules for the uniform address space.

use super::{ProgramError, Stage};

/// Name of the struct holding a program's uniforms
pub const UNIFORM_BLOCK: &str = "Uniforms";

/// Supported uniform member types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformKind {
    Float,
    Int,
    Vec2,
    Vec3,
    Mat4,
}

impl UniformKind {
    fn parse(ty: &str) -> Option<Self> {
        match ty {
            "f32" => Some(Self::Float),
            "i32" => Some(Self::Int),
            "vec2<f32>" | "vec2f" => Some(Self::Vec2),
            "vec3<f32>" | "vec3f" => Some(Self::Vec3),
            "mat4x4<f32>" | "mat4x4f" => Some(Self::Mat4),
            _ => None,
        }
    }

    /// Required byte alignment
    pub const fn align(self) -> u32 {
        match self {
            Self::Float | Self::Int => 4,
            Self::Vec2 => 8,
            Self::Vec3 | Self::Mat4 => 16,
        }
    }

    /// Size in bytes
    pub const fn size(self) -> u32 {
        match self {
            Self::Float | Self::Int => 4,
            Self::Vec2 => 8,
            Self::Vec3 => 12,
            Self::Mat4 => 64,
        }
    }
}

/// One member of the uniform block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformField {
    pub name: String,
    pub kind: UniformKind,
    /// Byte offset inside the block
    pub offset: u32,
}

/// Reflected uniform block of a program
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UniformLayout {
    fields: Vec<UniformField>,
    size: u32,
}

impl UniformLayout {
    /// Reflect the uniform block of a WGSL stage, if it declares one
    ///
    /// # Errors
    ///
    /// Returns a message describing the first member that cannot be laid out
    pub fn from_wgsl(source: &str) -> Result<Option<Self>, String> {
        let code = strip_comments(source);
        let Some(body) = struct_body(&code, UNIFORM_BLOCK) else {
            return Ok(None);
        };

        let mut fields: Vec<UniformField> = Vec::new();
        let mut offset = 0;
        for member in body.split(',').map(str::trim).filter(|m| !m.is_empty()) {
            if member.starts_with('@') {
                return Err(format!(
                    "attributes on uniform members are not supported: `{member}`"
                ));
            }
            let (name, ty) = member
                .split_once(':')
                .ok_or_else(|| format!("malformed uniform member `{member}`"))?;
            let name = name.trim();
            let ty: String = ty.chars().filter(|c| !c.is_whitespace()).collect();
            let kind = UniformKind::parse(&ty)
                .ok_or_else(|| format!("unsupported uniform member type `{ty}` for `{name}`"))?;
            if fields.iter().any(|f| f.name == name) {
                return Err(format!("duplicate uniform member `{name}`"));
            }

            offset = round_up(offset, kind.align());
            fields.push(UniformField {
                name: name.to_string(),
                kind,
                offset,
            });
            offset += kind.size();
        }

        Ok(Some(Self {
            fields,
            size: round_up(offset, 16),
        }))
    }

    /// Look up a member by name
    ///
    /// This is a linear scan, performed on every uniform set.
    pub fn find(&self, name: &str) -> Option<&UniformField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Block size in bytes, a multiple of 16
    pub const fn size(&self) -> u32 {
        self.size
    }

    pub fn fields(&self) -> &[UniformField] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Check both stages and produce the program's uniform layout
pub(crate) fn link(
    vertex_source: &str,
    fragment_source: &str,
) -> Result<UniformLayout, ProgramError> {
    let vertex = reflect_stage(Stage::Vertex, vertex_source)?;
    let fragment = reflect_stage(Stage::Fragment, fragment_source)?;

    match (vertex, fragment) {
        (Some(v), Some(f)) if v != f => Err(ProgramError::Link(format!(
            "uniform block `{UNIFORM_BLOCK}` differs between stages"
        ))),
        (Some(layout), _) | (None, Some(layout)) => Ok(layout),
        (None, None) => Ok(UniformLayout::default()),
    }
}

fn reflect_stage(stage: Stage, source: &str) -> Result<Option<UniformLayout>, ProgramError> {
    let entry = stage.entry_point();
    if !declares_function(&strip_comments(source), entry) {
        return Err(ProgramError::Compile {
            stage,
            message: format!("missing entry point `{entry}`"),
        });
    }
    UniformLayout::from_wgsl(source).map_err(|message| ProgramError::Compile { stage, message })
}

fn declares_function(code: &str, name: &str) -> bool {
    code.match_indices("fn").any(|(at, _)| {
        let before_ok = code[..at]
            .chars()
            .next_back()
            .is_none_or(|c| !is_ident_char(c));
        let rest = &code[at + 2..];
        let trimmed = rest.trim_start();
        before_ok
            && trimmed.len() < rest.len()
            && trimmed.starts_with(name)
            && trimmed[name.len()..]
                .chars()
                .next()
                .is_some_and(|c| c == '(' || c.is_whitespace())
    })
}

fn struct_body<'a>(code: &'a str, name: &str) -> Option<&'a str> {
    code.match_indices("struct").find_map(|(at, _)| {
        let rest = code[at + "struct".len()..].trim_start();
        let after = rest.strip_prefix(name)?;
        if after.chars().next().is_some_and(is_ident_char) {
            return None;
        }
        let open = after.find('{')?;
        if !after[..open].trim().is_empty() {
            return None;
        }
        let close = after[open..].find('}')?;
        Some(&after[open + 1..open + close])
    })
}

fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("//") {
            rest = after.find('\n').map_or("", |nl| &after[nl..]);
        } else if let Some(after) = rest.strip_prefix("/*") {
            rest = after.find("*/").map_or("", |end| &after[end + 2..]);
            out.push(' ');
        } else {
            let mut chars = rest.chars();
            if let Some(c) = chars.next() {
                out.push(c);
            }
            rest = chars.as_str();
        }
    }
    out
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

const fn round_up(value: u32, align: u32) -> u32 {
    value.div_ceil(align) * align
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERTEX: &str = r"
        // camera and light
        struct Uniforms {
            model: mat4x4<f32>,
            view: mat4x4<f32>,
            projection: mat4x4<f32>,
            lightPos: vec3<f32>,
            lightColor: vec3<f32>,
            viewPos: vec3<f32>,
        };
        @group(0) @binding(0) var<uniform> u: Uniforms;
        @vertex
        fn vs_main(@location(0) p: vec3<f32>) -> @builtin(position) vec4<f32> {
            return u.projection * u.view * u.model * vec4<f32>(p, 1.0);
        }
    ";

    fn fragment_with(block: &str) -> String {
        format!(
            "{block}\n@fragment\nfn fs_main() -> @location(0) vec4<f32> {{ return vec4<f32>(1.0); }}"
        )
    }

    #[test]
    fn test_reflect_offsets() {
        let layout = UniformLayout::from_wgsl(VERTEX).unwrap().unwrap();
        let offsets: Vec<(&str, u32)> = layout
            .fields()
            .iter()
            .map(|f| (f.name.as_str(), f.offset))
            .collect();
        assert_eq!(
            offsets,
            vec![
                ("model", 0),
                ("view", 64),
                ("projection", 128),
                ("lightPos", 192),
                ("lightColor", 208),
                ("viewPos", 224),
            ]
        );
        assert_eq!(layout.size(), 240);
    }

    #[test]
    fn test_scalar_packs_after_vec3() {
        let source = "struct Uniforms { color: vec3f, intensity: f32, scale: vec2<f32> }";
        let layout = UniformLayout::from_wgsl(source).unwrap().unwrap();
        assert_eq!(layout.find("intensity").unwrap().offset, 12);
        assert_eq!(layout.find("scale").unwrap().offset, 16);
        assert_eq!(layout.size(), 32);
    }

    #[test]
    fn test_missing_block() {
        assert_eq!(UniformLayout::from_wgsl("struct Other { a: f32 }"), Ok(None));
    }

    #[test]
    fn test_unsupported_member_type() {
        let err = UniformLayout::from_wgsl("struct Uniforms { m: mat3x3<f32> }").unwrap_err();
        assert!(err.contains("mat3x3<f32>"));
    }

    #[test]
    fn test_commented_block_ignored() {
        let source = "/* struct Uniforms { a: f32 } */ // struct Uniforms { b: f32 }";
        assert_eq!(UniformLayout::from_wgsl(source), Ok(None));
    }

    #[test]
    fn test_link_matching_stages() {
        let block = "struct Uniforms { model: mat4x4<f32>, view: mat4x4<f32>, projection: mat4x4<f32>, lightPos: vec3<f32>, lightColor: vec3<f32>, viewPos: vec3<f32> }";
        let layout = link(VERTEX, &fragment_with(block)).unwrap();
        assert!(layout.find("viewPos").is_some());
    }

    #[test]
    fn test_link_mismatched_stages() {
        let fragment = fragment_with("struct Uniforms { tint: vec3<f32> }");
        assert!(matches!(link(VERTEX, &fragment), Err(ProgramError::Link(_))));
    }

    #[test]
    fn test_missing_entry_point_is_compile_error() {
        let err = link(VERTEX, "fn main() {}").unwrap_err();
        assert!(matches!(
            err,
            ProgramError::Compile {
                stage: Stage::Fragment,
                ..
            }
        ));
    }

    #[test]
    fn test_entry_point_must_be_whole_identifier() {
        assert!(!declares_function("fn vs_main2() {}", "vs_main"));
        assert!(!declares_function("fnvs_main() {}", "vs_main"));
        assert!(declares_function("@vertex\nfn vs_main (x: f32) {}", "vs_main"));
    }
}
