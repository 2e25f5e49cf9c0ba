//! Shader compilation and linking for OpenGL ES.
//!
//! [`compile_stage`] and [`link_program`] wrap the driver's compiler; on
//! failure they delete the object they created and return the driver's info
//! log. [`Program::build`] combines them for a [`ShaderSource`], owns the two
//! stage objects for the program's lifetime, and resolves the attribute and
//! sampler locations the draw call needs.

use crate::error::{ShaderError, Stage};
use crate::scene::ShaderSource;

/// Formats a shader compilation error for human-readable debugging.
///
/// Prepends right-aligned line numbers to each line of `source`, then
/// appends the driver's error `log`, so the line numbers in the log can be
/// matched against the GLSL.
pub fn format_shader_error(source: &str, log: &str) -> String {
    let source_lines: Vec<&str> = source.lines().collect();
    let width = source_lines.len().max(1).to_string().len();

    let numbered = source_lines
        .iter()
        .enumerate()
        .map(|(i, line)| format!("{:>width$}: {line}", i + 1))
        .collect::<Vec<_>>()
        .join("\n");

    match (numbered.is_empty(), log.is_empty()) {
        (true, true) => String::new(),
        (true, false) => log.to_string(),
        (false, true) => numbered,
        (false, false) => format!("{numbered}\n\n{log}"),
    }
}

fn stage_kind(stage: Stage) -> u32 {
    match stage {
        Stage::Vertex => glow::VERTEX_SHADER,
        Stage::Fragment => glow::FRAGMENT_SHADER,
    }
}

/// Compiles a single shader stage.
///
/// # Errors
///
/// Returns `ShaderError::Compile` with the numbered source and the driver's
/// info log. The stage object is deleted before returning.
#[allow(unsafe_code)]
pub fn compile_stage(
    gl: &glow::Context,
    stage: Stage,
    source: &str,
) -> Result<glow::Shader, ShaderError> {
    use glow::HasContext;

    // SAFETY: glow wraps raw GL calls as unsafe. `stage_kind` only yields
    // valid shader types, and the shader is deleted on every error path.
    let shader = unsafe {
        gl.create_shader(stage_kind(stage))
            .map_err(|log| ShaderError::Compile { stage, log })?
    };

    unsafe {
        gl.shader_source(shader, source);
        gl.compile_shader(shader);
    }

    if unsafe { gl.get_shader_compile_status(shader) } {
        return Ok(shader);
    }

    let info_log = unsafe { gl.get_shader_info_log(shader) };
    unsafe { gl.delete_shader(shader) };
    log::error!("error compiling {stage} shader:\n{info_log}");
    Err(ShaderError::Compile {
        stage,
        log: format_shader_error(source, info_log.trim_end()),
    })
}

/// Links a vertex and fragment stage into a program.
///
/// The stages stay attached; they are owned by whoever owns the program.
///
/// # Errors
///
/// Returns `ShaderError::Link` with the driver's info log. The program
/// object is deleted before returning; the stages are left to the caller.
#[allow(unsafe_code)]
pub fn link_program(
    gl: &glow::Context,
    vertex: glow::Shader,
    fragment: glow::Shader,
) -> Result<glow::Program, ShaderError> {
    use glow::HasContext;

    // SAFETY: glow wraps raw GL calls as unsafe. Both stage handles come
    // from successful `compile_stage` calls on this context.
    let program = unsafe { gl.create_program().map_err(ShaderError::Link)? };

    unsafe {
        gl.attach_shader(program, vertex);
        gl.attach_shader(program, fragment);
        gl.link_program(program);
    }

    if unsafe { gl.get_program_link_status(program) } {
        return Ok(program);
    }

    let info_log = unsafe { gl.get_program_info_log(program) };
    unsafe { gl.delete_program(program) };
    log::error!("error linking program:\n{info_log}");
    Err(ShaderError::Link(info_log.trim_end().to_string()))
}

/// A linked program, its two stages, and the locations a draw call binds.
#[derive(Debug)]
pub struct Program {
    program: glow::Program,
    vertex: glow::Shader,
    fragment: glow::Shader,
    position: u32,
    tex_coord: Option<u32>,
    sampler: Option<glow::UniformLocation>,
}

impl Program {
    /// Compiles and links `source`, then resolves its attribute locations.
    ///
    /// The fragment stage is not compiled if the vertex stage fails.
    ///
    /// # Errors
    ///
    /// Returns `ShaderError::Compile`/`Link` from the driver, or
    /// `ShaderError::MissingAttribute` if a declared attribute is not active.
    /// Nothing is left allocated on any error path.
    #[allow(unsafe_code)]
    pub fn build(gl: &glow::Context, source: &ShaderSource) -> Result<Self, ShaderError> {
        use glow::HasContext;

        let vertex = compile_stage(gl, Stage::Vertex, source.vertex)?;
        let fragment = match compile_stage(gl, Stage::Fragment, source.fragment) {
            Ok(f) => f,
            Err(e) => {
                // SAFETY: `vertex` is a valid handle from compile_stage.
                unsafe { gl.delete_shader(vertex) };
                return Err(e);
            }
        };

        let delete_stages = || {
            // SAFETY: both handles are valid and no longer needed.
            unsafe {
                gl.delete_shader(vertex);
                gl.delete_shader(fragment);
            }
        };

        let program = match link_program(gl, vertex, fragment) {
            Ok(p) => p,
            Err(e) => {
                delete_stages();
                return Err(e);
            }
        };

        // SAFETY: `program` linked successfully on this context.
        let lookup = |name: &str| unsafe { gl.get_attrib_location(program, name) };
        let position = lookup(source.position_attr);
        let tex_coord = source.tex_coord_attr.map(|name| (name, lookup(name)));

        let missing = match (position, tex_coord) {
            (None, _) => Some(source.position_attr),
            (_, Some((name, None))) => Some(name),
            _ => None,
        };
        if let Some(name) = missing {
            unsafe { gl.delete_program(program) };
            delete_stages();
            return Err(ShaderError::MissingAttribute(name.to_string()));
        }

        let sampler = source
            .sampler_uniform
            .and_then(|name| unsafe { gl.get_uniform_location(program, name) });

        Ok(Self {
            program,
            vertex,
            fragment,
            position: position.unwrap_or_default(),
            tex_coord: tex_coord.and_then(|(_, loc)| loc),
            sampler,
        })
    }

    pub fn raw(&self) -> glow::Program {
        self.program
    }

    /// Location of the position attribute.
    pub fn position(&self) -> u32 {
        self.position
    }

    /// Location of the texture coordinate attribute, if the program has one.
    pub fn tex_coord(&self) -> Option<u32> {
        self.tex_coord
    }

    /// Location of the sampler uniform, if the program has one.
    pub fn sampler(&self) -> Option<&glow::UniformLocation> {
        self.sampler.as_ref()
    }

    /// Deletes the program and both of its stages.
    #[allow(unsafe_code)]
    pub fn destroy(self, gl: &glow::Context) {
        use glow::HasContext;

        // SAFETY: all three handles were created in `build` on this context
        // and `self` is consumed, so they cannot be used again.
        unsafe {
            gl.delete_program(self.program);
            gl.delete_shader(self.vertex);
            gl.delete_shader(self.fragment);
        }
    }
}
