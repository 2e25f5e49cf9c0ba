//! GPU resources for a [`SceneKind`]: program, vertex/index buffers and the
//! optional sample texture.

use super::check;
use super::shader::Program;
use super::texture::create_sample_texture;
use crate::error::RenderError;
use crate::scene::{Geometry, SceneKind};

/// Buffers uploaded from a [`Geometry`].
#[derive(Debug)]
struct Mesh {
    geometry: Geometry,
    vertices: glow::Buffer,
    indices: Option<glow::Buffer>,
}

/// Everything needed to draw one [`SceneKind`].
#[derive(Debug)]
pub struct Scene {
    kind: SceneKind,
    program: Option<Program>,
    mesh: Option<Mesh>,
    texture: Option<glow::Texture>,
}

#[allow(unsafe_code)]
fn create_buffer(
    gl: &glow::Context,
    target: u32,
    bytes: &[u8],
) -> Result<glow::Buffer, RenderError> {
    use glow::HasContext;

    // SAFETY: the buffer is bound only for the upload and unbound after.
    unsafe {
        let buffer = gl.create_buffer().map_err(|message| RenderError::Create {
            object: "buffer",
            message,
        })?;
        gl.bind_buffer(target, Some(buffer));
        gl.buffer_data_u8_slice(target, bytes, glow::STATIC_DRAW);
        gl.bind_buffer(target, None);
        Ok(buffer)
    }
}

impl Scene {
    /// Builds the program, uploads geometry, and creates the sample texture
    /// if the scene samples one. A clear-only scene allocates nothing.
    ///
    /// # Errors
    ///
    /// Returns `RenderError::Shader` if the program fails to build, or
    /// `RenderError::Create`/`Gl` if a buffer or texture cannot be created.
    /// Whatever was already created is released before returning.
    pub fn new(gl: &glow::Context, kind: SceneKind) -> Result<Self, RenderError> {
        let mut scene = Self {
            kind,
            program: None,
            mesh: None,
            texture: None,
        };
        if let Err(e) = scene.build(gl) {
            scene.destroy(gl);
            return Err(e);
        }
        Ok(scene)
    }

    fn build(&mut self, gl: &glow::Context) -> Result<(), RenderError> {
        let (Some(source), Some(geometry)) = (self.kind.shader_source(), self.kind.geometry())
        else {
            return Ok(());
        };

        self.program = Some(Program::build(gl, &source)?);

        let vertices = create_buffer(
            gl,
            glow::ARRAY_BUFFER,
            bytemuck::cast_slice(&geometry.vertices),
        )?;
        let indices = match &geometry.indices {
            Some(indices) => create_buffer(
                gl,
                glow::ELEMENT_ARRAY_BUFFER,
                bytemuck::cast_slice(indices),
            )
            .map(Some),
            None => Ok(None),
        };
        let indices = match indices {
            Ok(indices) => indices,
            Err(e) => {
                delete_buffer(gl, vertices);
                return Err(e);
            }
        };
        self.mesh = Some(Mesh {
            geometry,
            vertices,
            indices,
        });

        if self.kind.samples_texture() {
            self.texture = Some(create_sample_texture(gl)?);
        }
        check::gl_error(gl, "scene setup")
    }

    pub fn kind(&self) -> SceneKind {
        self.kind
    }

    /// Issues the scene's draw call into whatever framebuffer is bound.
    /// A clear-only scene draws nothing.
    ///
    /// # Errors
    ///
    /// Returns `RenderError::Gl` if the driver reports an error for the
    /// draw call.
    #[allow(unsafe_code)]
    pub fn draw(&self, gl: &glow::Context) -> Result<(), RenderError> {
        use glow::HasContext;

        let (Some(program), Some(mesh)) = (&self.program, &self.mesh) else {
            return Ok(());
        };
        let geometry = &mesh.geometry;
        let stride = geometry.stride_bytes() as i32;
        let count = geometry.draw_count() as i32;

        // SAFETY: every handle was created in `new` on this context, and the
        // attribute layout matches the uploaded vertex data.
        unsafe {
            gl.use_program(Some(program.raw()));
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(mesh.vertices));

            gl.vertex_attrib_pointer_f32(
                program.position(),
                geometry.position_components as i32,
                glow::FLOAT,
                false,
                stride,
                0,
            );
            gl.enable_vertex_attrib_array(program.position());

            if let Some(tex_coord) = program.tex_coord() {
                gl.vertex_attrib_pointer_f32(
                    tex_coord,
                    geometry.tex_coord_components as i32,
                    glow::FLOAT,
                    false,
                    stride,
                    geometry.tex_coord_offset_bytes() as i32,
                );
                gl.enable_vertex_attrib_array(tex_coord);
            }

            if let Some(texture) = self.texture {
                gl.active_texture(glow::TEXTURE0);
                gl.bind_texture(glow::TEXTURE_2D, Some(texture));
                gl.uniform_1_i32(program.sampler(), 0);
            }

            match mesh.indices {
                Some(indices) => {
                    gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(indices));
                    gl.draw_elements(glow::TRIANGLES, count, glow::UNSIGNED_SHORT, 0);
                }
                None => gl.draw_arrays(glow::TRIANGLES, 0, count),
            }
        }
        let drawn = check::gl_error(
            gl,
            if mesh.indices.is_some() {
                "glDrawElements"
            } else {
                "glDrawArrays"
            },
        );

        unsafe {
            gl.bind_texture(glow::TEXTURE_2D, None);
            gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, None);
            gl.bind_buffer(glow::ARRAY_BUFFER, None);
            gl.use_program(None);
        }
        drawn
    }

    /// Deletes the program, buffers and texture.
    #[allow(unsafe_code)]
    pub fn destroy(&mut self, gl: &glow::Context) {
        if let Some(program) = self.program.take() {
            program.destroy(gl);
        }
        if let Some(mesh) = self.mesh.take() {
            delete_buffer(gl, mesh.vertices);
            if let Some(indices) = mesh.indices {
                delete_buffer(gl, indices);
            }
        }
        if let Some(texture) = self.texture.take() {
            use glow::HasContext;

            // SAFETY: the texture was created in `new` and is no longer bound.
            unsafe { gl.delete_texture(texture) };
        }
    }
}

#[allow(unsafe_code)]
fn delete_buffer(gl: &glow::Context, buffer: glow::Buffer) {
    use glow::HasContext;

    // SAFETY: `buffer` was created by `create_buffer` on this context.
    unsafe { gl.delete_buffer(buffer) };
}
