//! What a session draws: shader sources, vertex data, and draw mode.
//!
//! All sources are GLSL ES 1.00 so they compile under an OpenGL ES 2.0
//! context as well as any 3.x context the driver hands out instead.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Vertex stage for [`SceneKind::Triangle`]: passes positions through.
pub const TRIANGLE_VERTEX_SHADER: &str = r#"attribute vec4 a_position;
void main()
{
    gl_Position = a_position;
}
"#;

/// Fragment stage for [`SceneKind::Triangle`]: solid red.
pub const TRIANGLE_FRAGMENT_SHADER: &str = r#"precision mediump float;
void main()
{
    gl_FragColor = vec4(1.0, 0.0, 0.0, 1.0);
}
"#;

/// Vertex stage for [`SceneKind::TexturedQuad`].
pub const QUAD_VERTEX_SHADER: &str = r#"attribute vec4 a_position;
attribute vec2 a_texCoord;
varying vec2 v_texCoord;
void main()
{
    gl_Position = a_position;
    v_texCoord = a_texCoord;
}
"#;

/// Fragment stage for [`SceneKind::TexturedQuad`]: samples unit 0.
pub const QUAD_FRAGMENT_SHADER: &str = r#"precision mediump float;
varying vec2 v_texCoord;
uniform sampler2D s_texture;
void main()
{
    gl_FragColor = texture2D(s_texture, v_texCoord);
}
"#;

/// Triangle positions (x, y, z).
#[rustfmt::skip]
const TRIANGLE_VERTICES: [f32; 9] = [
     0.0,  0.5, 0.0,
    -0.5, -0.5, 0.0,
     0.5, -0.5, 0.0,
];

/// Quad vertices, interleaved position (x, y, z) and texcoord (s, t).
#[rustfmt::skip]
const QUAD_VERTICES: [f32; 20] = [
    -0.5,  0.5, 0.0,  0.0, 0.0,
    -0.5, -0.5, 0.0,  0.0, 1.0,
     0.5, -0.5, 0.0,  1.0, 1.0,
     0.5,  0.5, 0.0,  1.0, 0.0,
];

/// 2x2 RGB texture sampled by the textured quad: red, green, blue, yellow.
pub const SAMPLE_TEXELS: [u8; 12] = [
    255, 0, 0, //
    0, 255, 0, //
    0, 0, 255, //
    255, 255, 0,
];

/// Width and height of [`SAMPLE_TEXELS`].
pub const SAMPLE_TEXTURE_SIZE: u32 = 2;

/// Vertex/fragment sources plus the names the pipeline binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderSource {
    pub vertex: &'static str,
    pub fragment: &'static str,
    pub position_attr: &'static str,
    pub tex_coord_attr: Option<&'static str>,
    pub sampler_uniform: Option<&'static str>,
}

/// Vertex data for one draw call.
///
/// Vertices are interleaved: `position_components` floats of position,
/// followed by `tex_coord_components` floats of texture coordinate.
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    pub vertices: Vec<f32>,
    pub position_components: usize,
    pub tex_coord_components: usize,
    pub indices: Option<Vec<u16>>,
}

impl Geometry {
    /// Number of floats per vertex.
    pub fn components_per_vertex(&self) -> usize {
        self.position_components + self.tex_coord_components
    }

    /// Byte distance between consecutive vertices.
    pub fn stride_bytes(&self) -> usize {
        self.components_per_vertex() * std::mem::size_of::<f32>()
    }

    /// Byte offset of the texture coordinate inside a vertex.
    pub fn tex_coord_offset_bytes(&self) -> usize {
        self.position_components * std::mem::size_of::<f32>()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / self.components_per_vertex()
    }

    /// Number of elements the draw call covers: the index count for
    /// indexed geometry, otherwise the vertex count.
    pub fn draw_count(&self) -> usize {
        match &self.indices {
            Some(indices) => indices.len(),
            None => self.vertex_count(),
        }
    }
}

/// The fixed content a session renders each pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SceneKind {
    /// Clear only; no draw call is issued.
    Clear,
    /// Red triangle, non-indexed.
    #[default]
    Triangle,
    /// Quad sampling [`SAMPLE_TEXELS`], indexed.
    TexturedQuad,
}

impl SceneKind {
    pub const ALL: [SceneKind; 3] = [
        SceneKind::Clear,
        SceneKind::Triangle,
        SceneKind::TexturedQuad,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SceneKind::Clear => "clear",
            SceneKind::Triangle => "triangle",
            SceneKind::TexturedQuad => "textured-quad",
        }
    }

    /// Shader sources, or `None` for a clear-only scene.
    pub fn shader_source(self) -> Option<ShaderSource> {
        match self {
            SceneKind::Clear => None,
            SceneKind::Triangle => Some(ShaderSource {
                vertex: TRIANGLE_VERTEX_SHADER,
                fragment: TRIANGLE_FRAGMENT_SHADER,
                position_attr: "a_position",
                tex_coord_attr: None,
                sampler_uniform: None,
            }),
            SceneKind::TexturedQuad => Some(ShaderSource {
                vertex: QUAD_VERTEX_SHADER,
                fragment: QUAD_FRAGMENT_SHADER,
                position_attr: "a_position",
                tex_coord_attr: Some("a_texCoord"),
                sampler_uniform: Some("s_texture"),
            }),
        }
    }

    /// Vertex data, or `None` for a clear-only scene.
    pub fn geometry(self) -> Option<Geometry> {
        match self {
            SceneKind::Clear => None,
            SceneKind::Triangle => Some(Geometry {
                vertices: TRIANGLE_VERTICES.to_vec(),
                position_components: 3,
                tex_coord_components: 0,
                indices: None,
            }),
            SceneKind::TexturedQuad => Some(Geometry {
                vertices: QUAD_VERTICES.to_vec(),
                position_components: 3,
                tex_coord_components: 2,
                indices: Some(vec![0, 1, 2, 0, 2, 3]),
            }),
        }
    }

    /// Whether the scene samples [`SAMPLE_TEXELS`].
    pub fn samples_texture(self) -> bool {
        self.shader_source()
            .is_some_and(|src| src.sampler_uniform.is_some())
    }
}

impl fmt::Display for SceneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SceneKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SceneKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| {
                let names: Vec<&str> = SceneKind::ALL.iter().map(|k| k.name()).collect();
                format!("unknown scene '{s}' (expected one of: {})", names.join(", "))
            })
    }
}
