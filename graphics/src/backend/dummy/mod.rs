//! Dummy backend for headless testing.
//!
//! [`DummyBackend`] keeps an in-memory model of every device object and a log
//! of every call. Tests use it to observe what the renderer asked the device
//! to do: draw calls and their instance counts, buffer reallocations, uniform
//! writes, and attribute slots that point at an outdated allocation.
//!
//! Shader "compilation" scans the GLSL interface (see `glsl.rs`) instead of
//! compiling, and linking matches fragment inputs against vertex outputs.
//! Every declared variable is reported as active.

mod glsl;

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::num::NonZeroU32;

use super::{
    ActiveAttribute, ActiveUniform, AttribPointer, BufferId, BufferTarget, BufferUsage,
    DrawCommand, GpuBackend, GpuObject, ProgramId, ShaderId, ShaderStage, UniformLocation,
    VertexArrayId,
};
use crate::error::{GraphicsError, GraphicsResult};
use crate::shader::UniformValue;
use glsl::{Declaration, Storage};

/// A recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Buffer storage replaced.
    BufferData {
        buffer: BufferId,
        target: BufferTarget,
        size: usize,
        usage: BufferUsage,
    },
    /// Part of a buffer overwritten.
    BufferSubData {
        buffer: BufferId,
        offset: usize,
        size: usize,
    },
    /// Buffer deleted.
    DeleteBuffer(BufferId),
    /// Shader stage compiled.
    CompileShader(ShaderId, ShaderStage),
    /// Program linked.
    LinkProgram(ProgramId),
    /// Program made current.
    UseProgram(Option<ProgramId>),
    /// Uniform written.
    SetUniform {
        program: Option<ProgramId>,
        location: UniformLocation,
        value: UniformValue,
    },
    /// Program deleted.
    DeleteProgram(ProgramId),
    /// Vertex array created.
    CreateVertexArray(VertexArrayId),
    /// Attribute slot pointed at a buffer.
    SetAttribute {
        vertex_array: VertexArrayId,
        buffer: BufferId,
        pointer: AttribPointer,
    },
    /// Index buffer attached.
    SetIndexBuffer {
        vertex_array: VertexArrayId,
        buffer: BufferId,
    },
    /// Vertex array deleted.
    DeleteVertexArray(VertexArrayId),
    /// Instanced draw issued.
    Draw(DrawCall),
    /// Debug label attached.
    Label(GpuObject, String),
}

/// A recorded draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawCall {
    /// Program used.
    pub program: ProgramId,
    /// Vertex array used.
    pub vertex_array: VertexArrayId,
    /// Draw parameters.
    pub command: DrawCommand,
}

#[derive(Debug, Default)]
struct DummyBuffer {
    data: Vec<u8>,
    target: Option<BufferTarget>,
    allocation: u64,
}

#[derive(Debug)]
struct DummyProgram {
    attributes: Vec<ActiveAttribute>,
    uniforms: Vec<ActiveUniform>,
    values: HashMap<UniformLocation, UniformValue>,
}

#[derive(Debug, Clone, Copy)]
struct BoundAttribute {
    buffer: BufferId,
    allocation: u64,
}

#[derive(Debug, Default)]
struct DummyVertexArray {
    attributes: BTreeMap<u32, BoundAttribute>,
    index_buffer: Option<BufferId>,
}

#[derive(Debug, Default)]
struct DummyState {
    next_id: u32,
    next_allocation: u64,
    buffers: HashMap<BufferId, DummyBuffer>,
    shaders: HashMap<ShaderId, (ShaderStage, Vec<Declaration>)>,
    programs: HashMap<ProgramId, DummyProgram>,
    vertex_arrays: HashMap<VertexArrayId, DummyVertexArray>,
    labels: HashMap<GpuObject, String>,
    current_program: Option<ProgramId>,
    commands: Vec<Command>,
    errors: Vec<String>,
    stale_reads: usize,
}

impl DummyState {
    fn next_name(&mut self) -> NonZeroU32 {
        let name = NonZeroU32::MIN.saturating_add(self.next_id);
        self.next_id += 1;
        name
    }

    fn error(&mut self, message: String) {
        log::warn!("DummyBackend: {message}");
        self.errors.push(message);
    }
}

/// Dummy GPU backend that models device state in memory.
#[derive(Debug, Default)]
pub struct DummyBackend {
    state: RefCell<DummyState>,
}

impl DummyBackend {
    /// Create a new dummy backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get every call recorded so far.
    pub fn commands(&self) -> Vec<Command> {
        self.state.borrow().commands.clone()
    }

    /// Get the recorded draw calls.
    pub fn draw_calls(&self) -> Vec<DrawCall> {
        self.state
            .borrow()
            .commands
            .iter()
            .filter_map(|c| match c {
                Command::Draw(call) => Some(*call),
                _ => None,
            })
            .collect()
    }

    /// Count recorded full reallocations of `buffer`.
    pub fn reallocation_count(&self, buffer: BufferId) -> usize {
        self.state
            .borrow()
            .commands
            .iter()
            .filter(|c| matches!(c, Command::BufferData { buffer: b, .. } if *b == buffer))
            .count()
    }

    /// Clear the call log, keeping object state.
    pub fn clear_commands(&self) {
        self.state.borrow_mut().commands.clear();
    }

    /// Get a copy of a buffer's current storage.
    pub fn buffer_contents(&self, buffer: BufferId) -> Option<Vec<u8>> {
        self.state
            .borrow()
            .buffers
            .get(&buffer)
            .map(|b| b.data.clone())
    }

    /// Get the last value written to a program's uniform.
    pub fn uniform_value(&self, program: ProgramId, name: &str) -> Option<UniformValue> {
        let state = self.state.borrow();
        let program = state.programs.get(&program)?;
        let uniform = program.uniforms.iter().find(|u| u.name == name)?;
        program.values.get(&uniform.location).cloned()
    }

    /// Get the debug label attached to an object.
    pub fn label(&self, object: GpuObject) -> Option<String> {
        self.state.borrow().labels.get(&object).cloned()
    }

    /// Get the invalid-operation messages raised so far.
    pub fn errors(&self) -> Vec<String> {
        self.state.borrow().errors.clone()
    }

    /// Count attribute reads (per draw) from a slot whose buffer was
    /// reallocated after the slot was pointed at it.
    pub fn stale_attribute_reads(&self) -> usize {
        self.state.borrow().stale_reads
    }

    /// Count live buffers, programs and vertex arrays.
    pub fn live_objects(&self) -> usize {
        let state = self.state.borrow();
        state.buffers.len() + state.programs.len() + state.vertex_arrays.len()
    }
}

impl GpuBackend for DummyBackend {
    fn name(&self) -> &'static str {
        "Dummy"
    }

    fn create_buffer(&self) -> GraphicsResult<BufferId> {
        let mut state = self.state.borrow_mut();
        let id = BufferId(state.next_name());
        state.buffers.insert(id, DummyBuffer::default());
        log::trace!("DummyBackend: create_buffer {}", id.raw());
        Ok(id)
    }

    fn buffer_data(&self, buffer: BufferId, target: BufferTarget, data: &[u8], usage: BufferUsage) {
        let mut state = self.state.borrow_mut();
        log::trace!(
            "DummyBackend: buffer_data {} ({} bytes, {:?})",
            buffer.raw(),
            data.len(),
            usage
        );
        state.next_allocation += 1;
        let allocation = state.next_allocation;
        match state.buffers.get_mut(&buffer) {
            Some(b) => {
                b.data = data.to_vec();
                b.target = Some(target);
                b.allocation = allocation;
            }
            None => state.error(format!("buffer_data on unknown buffer {}", buffer.raw())),
        }
        state.commands.push(Command::BufferData {
            buffer,
            target,
            size: data.len(),
            usage,
        });
    }

    fn buffer_sub_data(&self, buffer: BufferId, _target: BufferTarget, offset: usize, data: &[u8]) {
        let mut state = self.state.borrow_mut();
        log::trace!(
            "DummyBackend: buffer_sub_data {} (+{offset}, {} bytes)",
            buffer.raw(),
            data.len()
        );
        let result = match state.buffers.get_mut(&buffer) {
            Some(b) if offset + data.len() <= b.data.len() => {
                b.data[offset..offset + data.len()].copy_from_slice(data);
                Ok(())
            }
            Some(b) => Err(format!(
                "buffer_sub_data past the end of buffer {} ({} > {})",
                buffer.raw(),
                offset + data.len(),
                b.data.len()
            )),
            None => Err(format!("buffer_sub_data on unknown buffer {}", buffer.raw())),
        };
        if let Err(message) = result {
            state.error(message);
        }
        state.commands.push(Command::BufferSubData {
            buffer,
            offset,
            size: data.len(),
        });
    }

    fn delete_buffer(&self, buffer: BufferId) {
        let mut state = self.state.borrow_mut();
        log::trace!("DummyBackend: delete_buffer {}", buffer.raw());
        if state.buffers.remove(&buffer).is_none() {
            state.error(format!("delete of unknown buffer {}", buffer.raw()));
        }
        state.labels.remove(&GpuObject::Buffer(buffer));
        state.commands.push(Command::DeleteBuffer(buffer));
    }

    fn compile_shader(&self, stage: ShaderStage, source: &str) -> GraphicsResult<ShaderId> {
        let declarations = glsl::scan(stage, source)
            .map_err(|log| GraphicsError::ShaderCompileError { stage, log })?;
        let mut state = self.state.borrow_mut();
        let id = ShaderId(state.next_name());
        log::trace!(
            "DummyBackend: compile_shader {} ({stage}, {} declarations)",
            id.raw(),
            declarations.len()
        );
        state.shaders.insert(id, (stage, declarations));
        state.commands.push(Command::CompileShader(id, stage));
        Ok(id)
    }

    fn delete_shader(&self, shader: ShaderId) {
        log::trace!("DummyBackend: delete_shader {}", shader.raw());
        self.state.borrow_mut().shaders.remove(&shader);
    }

    fn link_program(&self, vertex: ShaderId, fragment: ShaderId) -> GraphicsResult<ProgramId> {
        let mut state = self.state.borrow_mut();
        let (vertex_decls, fragment_decls) =
            match (state.shaders.get(&vertex), state.shaders.get(&fragment)) {
                (Some((ShaderStage::Vertex, v)), Some((ShaderStage::Fragment, f))) => {
                    (v.clone(), f.clone())
                }
                _ => {
                    return Err(GraphicsError::ProgramLinkError(
                        "error: program needs one vertex and one fragment shader".to_string(),
                    ));
                }
            };

        let (attributes, uniforms) =
            link_interfaces(&vertex_decls, &fragment_decls).map_err(GraphicsError::ProgramLinkError)?;

        let id = ProgramId(state.next_name());
        log::trace!(
            "DummyBackend: link_program {} ({} attributes, {} uniforms)",
            id.raw(),
            attributes.len(),
            uniforms.len()
        );
        state.programs.insert(
            id,
            DummyProgram {
                attributes,
                uniforms,
                values: HashMap::new(),
            },
        );
        state.commands.push(Command::LinkProgram(id));
        Ok(id)
    }

    fn active_attributes(&self, program: ProgramId) -> Vec<ActiveAttribute> {
        self.state
            .borrow()
            .programs
            .get(&program)
            .map(|p| p.attributes.clone())
            .unwrap_or_default()
    }

    fn active_uniforms(&self, program: ProgramId) -> Vec<ActiveUniform> {
        self.state
            .borrow()
            .programs
            .get(&program)
            .map(|p| p.uniforms.clone())
            .unwrap_or_default()
    }

    fn use_program(&self, program: Option<ProgramId>) {
        let mut state = self.state.borrow_mut();
        log::trace!("DummyBackend: use_program {:?}", program.map(ProgramId::raw));
        if let Some(id) = program
            && !state.programs.contains_key(&id)
        {
            state.error(format!("use of unknown program {}", id.raw()));
        }
        state.current_program = program;
        state.commands.push(Command::UseProgram(program));
    }

    fn set_uniform(&self, location: UniformLocation, value: &UniformValue) {
        let mut state = self.state.borrow_mut();
        log::trace!("DummyBackend: set_uniform {} = {value:?}", location.raw());
        let program = state.current_program;
        let stored = program
            .and_then(|id| state.programs.get_mut(&id))
            .map(|p| p.values.insert(location, value.clone()))
            .is_some();
        if !stored {
            state.error(format!("set_uniform {} with no program bound", location.raw()));
        }
        state.commands.push(Command::SetUniform {
            program,
            location,
            value: value.clone(),
        });
    }

    fn delete_program(&self, program: ProgramId) {
        let mut state = self.state.borrow_mut();
        log::trace!("DummyBackend: delete_program {}", program.raw());
        if state.programs.remove(&program).is_none() {
            state.error(format!("delete of unknown program {}", program.raw()));
        }
        if state.current_program == Some(program) {
            state.current_program = None;
        }
        state.labels.remove(&GpuObject::Program(program));
        state.commands.push(Command::DeleteProgram(program));
    }

    fn create_vertex_array(&self) -> GraphicsResult<VertexArrayId> {
        let mut state = self.state.borrow_mut();
        let id = VertexArrayId(state.next_name());
        log::trace!("DummyBackend: create_vertex_array {}", id.raw());
        state.vertex_arrays.insert(id, DummyVertexArray::default());
        state.commands.push(Command::CreateVertexArray(id));
        Ok(id)
    }

    fn set_attribute(&self, vertex_array: VertexArrayId, buffer: BufferId, pointer: &AttribPointer) {
        let mut state = self.state.borrow_mut();
        log::trace!(
            "DummyBackend: set_attribute vao {} slot {} <- buffer {} (divisor {})",
            vertex_array.raw(),
            pointer.location,
            buffer.raw(),
            pointer.divisor
        );
        match state.buffers.get(&buffer).map(|b| b.allocation) {
            Some(allocation) => match state.vertex_arrays.get_mut(&vertex_array) {
                Some(vao) => {
                    vao.attributes
                        .insert(pointer.location, BoundAttribute { buffer, allocation });
                }
                None => state.error(format!("set_attribute on unknown vertex array {}", vertex_array.raw())),
            },
            None => state.error(format!("set_attribute from unknown buffer {}", buffer.raw())),
        }
        state.commands.push(Command::SetAttribute {
            vertex_array,
            buffer,
            pointer: *pointer,
        });
    }

    fn set_index_buffer(&self, vertex_array: VertexArrayId, buffer: BufferId) {
        let mut state = self.state.borrow_mut();
        log::trace!(
            "DummyBackend: set_index_buffer vao {} <- buffer {}",
            vertex_array.raw(),
            buffer.raw()
        );
        if !state.buffers.contains_key(&buffer) {
            state.error(format!("index buffer {} does not exist", buffer.raw()));
        }
        match state.vertex_arrays.get_mut(&vertex_array) {
            Some(vao) => vao.index_buffer = Some(buffer),
            None => state.error(format!("set_index_buffer on unknown vertex array {}", vertex_array.raw())),
        }
        state.commands.push(Command::SetIndexBuffer {
            vertex_array,
            buffer,
        });
    }

    fn delete_vertex_array(&self, vertex_array: VertexArrayId) {
        let mut state = self.state.borrow_mut();
        log::trace!("DummyBackend: delete_vertex_array {}", vertex_array.raw());
        if state.vertex_arrays.remove(&vertex_array).is_none() {
            state.error(format!("delete of unknown vertex array {}", vertex_array.raw()));
        }
        state.labels.remove(&GpuObject::VertexArray(vertex_array));
        state.commands.push(Command::DeleteVertexArray(vertex_array));
    }

    fn draw(&self, program: ProgramId, vertex_array: VertexArrayId, command: &DrawCommand) {
        let mut state = self.state.borrow_mut();
        log::trace!(
            "DummyBackend: draw program {} vao {} ({} x {} instances)",
            program.raw(),
            vertex_array.raw(),
            command.count,
            command.instance_count
        );

        let mut problems = Vec::new();
        let mut stale = 0;
        if !state.programs.contains_key(&program) {
            problems.push(format!("draw with unknown program {}", program.raw()));
        }
        match state.vertex_arrays.get(&vertex_array) {
            Some(vao) => {
                for (slot, bound) in &vao.attributes {
                    match state.buffers.get(&bound.buffer) {
                        Some(b) if b.allocation != bound.allocation => stale += 1,
                        Some(_) => {}
                        None => problems.push(format!(
                            "draw reads slot {slot} from deleted buffer {}",
                            bound.buffer.raw()
                        )),
                    }
                }
                if command.index_type.is_some() && vao.index_buffer.is_none() {
                    problems.push("indexed draw without an index buffer".to_string());
                }
            }
            None => problems.push(format!("draw with unknown vertex array {}", vertex_array.raw())),
        }

        for message in problems {
            state.error(message);
        }
        state.stale_reads += stale;
        state.commands.push(Command::Draw(DrawCall {
            program,
            vertex_array,
            command: *command,
        }));
    }

    fn set_label(&self, object: GpuObject, label: &str) {
        let mut state = self.state.borrow_mut();
        log::trace!("DummyBackend: label {object:?} = {label}");
        state.labels.insert(object, label.to_string());
        state
            .commands
            .push(Command::Label(object, label.to_string()));
    }
}

/// Resolve the program interface from both stages' declarations.
fn link_interfaces(
    vertex: &[Declaration],
    fragment: &[Declaration],
) -> Result<(Vec<ActiveAttribute>, Vec<ActiveUniform>), String> {
    for input in fragment.iter().filter(|d| d.storage == Storage::In) {
        let output = vertex
            .iter()
            .find(|d| d.storage == Storage::Out && d.name == input.name)
            .ok_or_else(|| {
                format!(
                    "error: fragment shader input `{}` has no matching vertex shader output",
                    input.name
                )
            })?;
        if output.type_name() != input.type_name() || output.array_size != input.array_size {
            return Err(format!(
                "error: `{}` is {} in the vertex shader but {} in the fragment shader",
                input.name,
                output.type_name(),
                input.type_name()
            ));
        }
    }

    Ok((assign_attributes(vertex)?, assign_uniforms(vertex, fragment)?))
}

fn assign_attributes(vertex: &[Declaration]) -> Result<Vec<ActiveAttribute>, String> {
    let inputs: Vec<_> = vertex.iter().filter(|d| d.storage == Storage::In).collect();
    let mut used: Vec<bool> = Vec::new();
    let claim = |start: u32, count: u32, used: &mut Vec<bool>| -> bool {
        let end = (start + count) as usize;
        if used.len() < end {
            used.resize(end, false);
        }
        if used[start as usize..end].iter().any(|&u| u) {
            return false;
        }
        used[start as usize..end].iter_mut().for_each(|u| *u = true);
        true
    };

    let mut locations = vec![None; inputs.len()];
    for (i, decl) in inputs.iter().enumerate() {
        if let Some(location) = decl.location {
            if !claim(location, decl.slot_count(), &mut used) {
                return Err(format!(
                    "error: attribute `{}` overlaps another attribute at location {location}",
                    decl.name
                ));
            }
            locations[i] = Some(location);
        }
    }
    for (i, decl) in inputs.iter().enumerate() {
        if locations[i].is_none() {
            let mut start = 0;
            while !claim(start, decl.slot_count(), &mut used) {
                start += 1;
            }
            locations[i] = Some(start);
        }
    }

    Ok(inputs
        .iter()
        .zip(locations)
        .map(|(decl, location)| ActiveAttribute {
            name: decl.name.clone(),
            location: location.unwrap_or_default(),
            base_type: decl.base_type,
            components: decl.components,
            array_size: decl.array_size,
        })
        .collect())
}

fn assign_uniforms(
    vertex: &[Declaration],
    fragment: &[Declaration],
) -> Result<Vec<ActiveUniform>, String> {
    let mut uniforms: Vec<(ActiveUniform, String)> = Vec::new();
    let mut next_location = 0;
    let declared = vertex
        .iter()
        .chain(fragment)
        .filter(|d| d.storage == Storage::Uniform);
    for decl in declared {
        if let Some((existing, type_name)) = uniforms.iter().find(|(u, _)| u.name == decl.name) {
            if *type_name != decl.type_name() || existing.array_size != decl.array_size {
                return Err(format!(
                    "error: uniform `{}` declared as both {} and {}",
                    decl.name,
                    type_name,
                    decl.type_name()
                ));
            }
            continue;
        }
        uniforms.push((
            ActiveUniform {
                name: decl.name.clone(),
                location: UniformLocation(next_location),
                base_type: decl.base_type,
                components: decl.components,
                array_size: decl.array_size,
            },
            decl.type_name(),
        ));
        next_location += decl.array_size;
    }
    Ok(uniforms.into_iter().map(|(u, _)| u).collect())
}
