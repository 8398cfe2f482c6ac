//! Command record wire format.
//!
//! ```text
//! ┌──────────────────────┬──────────────────────┬──────────────────┬─────────┐
//! │ RecordHeader (16 B)  │ fixed payload fields │ variable tail    │ padding │
//! │ kind | size | next   │ ids, floats, spans   │ utf-8 / f32 data │ to 8 B  │
//! └──────────────────────┴──────────────────────┴──────────────────┴─────────┘
//! ```
//!
//! Fixed fields are packed back to back in declaration order. Strings and
//! float arrays appear in the fixed part as a [`Span`] `(offset, len)` whose
//! offset is relative to the start of the record, and their bytes live in the
//! tail. `size` covers header, fixed part and tail; `next_offset` is the
//! absolute arena offset of the following record.
//!
//! Encoding makes two passes over a command's fields: the first measures the
//! fixed part and the tail, the second writes straight into space reserved in
//! the arena, so encoding allocates nothing beyond arena growth.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Quat, Vec3, Vec4};

use super::{Command, CommandKind};
use crate::component::{ComponentId, LightKind};
use crate::core::arena::Arena;
use crate::errors::{GraphError, Result};

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct RecordHeader {
    pub kind: u32,
    /// Header + payload bytes, padding excluded.
    pub size: u32,
    pub next_offset: u64,
}

pub const HEADER_SIZE: usize = size_of::<RecordHeader>();

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct Span {
    offset: u32,
    len: u32,
}

const SPAN_SIZE: usize = size_of::<Span>();

// ============================================================================
// Field sinks
// ============================================================================

trait FieldSink {
    fn raw(&mut self, bytes: &[u8]);
    fn var(&mut self, bytes: &[u8]);

    fn u32(&mut self, v: u32) {
        self.raw(&v.to_ne_bytes());
    }

    fn f32(&mut self, v: f32) {
        self.raw(&v.to_ne_bytes());
    }

    fn id(&mut self, id: ComponentId) {
        self.raw(&id.0.to_ne_bytes());
    }

    fn floats(&mut self, values: &[f32]) {
        for &v in values {
            self.f32(v);
        }
    }

    fn str(&mut self, s: &str) {
        self.var(s.as_bytes());
    }

    fn float_array(&mut self, values: &[f32]) {
        self.var(bytemuck::cast_slice(values));
    }
}

#[derive(Default)]
struct Measure {
    fixed: usize,
    tail: usize,
}

impl FieldSink for Measure {
    fn raw(&mut self, bytes: &[u8]) {
        self.fixed += bytes.len();
    }

    fn var(&mut self, bytes: &[u8]) {
        self.fixed += SPAN_SIZE;
        self.tail += bytes.len();
    }
}

/// Writes into one record's reserved bytes (header excluded from `fixed_pos`
/// bookkeeping, included in span offsets).
struct Writer<'a> {
    record: &'a mut [u8],
    fixed_pos: usize,
    tail_pos: usize,
}

impl FieldSink for Writer<'_> {
    fn raw(&mut self, bytes: &[u8]) {
        let end = self.fixed_pos + bytes.len();
        self.record[self.fixed_pos..end].copy_from_slice(bytes);
        self.fixed_pos = end;
    }

    fn var(&mut self, bytes: &[u8]) {
        let end = self.tail_pos + bytes.len();
        self.record[self.tail_pos..end].copy_from_slice(bytes);
        let span = Span {
            offset: self.tail_pos as u32,
            len: bytes.len() as u32,
        };
        self.tail_pos = end;
        self.raw(bytemuck::bytes_of(&span));
    }
}

fn write_fields(cmd: &Command, w: &mut impl FieldSink) {
    match cmd {
        Command::CreateTransform { id, name }
        | Command::CreateScene { id, name }
        | Command::CreateShader { id, name }
        | Command::CreatePass { id, name }
        | Command::SetName { id, name } => {
            w.id(*id);
            w.str(name);
        }
        Command::CreateMesh { id, name, geometry, material } => {
            w.id(*id);
            w.id(*geometry);
            w.id(*material);
            w.str(name);
        }
        Command::CreateCamera { id, name, fov_y, near, far } => {
            w.id(*id);
            w.floats(&[*fov_y, *near, *far]);
            w.str(name);
        }
        Command::CreateLight { id, name, kind, color, intensity } => {
            w.id(*id);
            w.u32(*kind as u32);
            w.floats(&color.to_array());
            w.f32(*intensity);
            w.str(name);
        }
        Command::CreateText { id, name, text } => {
            w.id(*id);
            w.str(name);
            w.str(text);
        }
        Command::CreateGeometry { id, name, vertex_count } => {
            w.id(*id);
            w.u32(*vertex_count);
            w.str(name);
        }
        Command::CreateMaterial { id, name, shader } => {
            w.id(*id);
            w.id(*shader);
            w.str(name);
        }
        Command::CreateTexture { id, name, width, height } => {
            w.id(*id);
            w.u32(*width);
            w.u32(*height);
            w.str(name);
        }
        Command::CreateBuffer { id, name, data } => {
            w.id(*id);
            w.str(name);
            w.float_array(data);
        }
        Command::Delete { id } | Command::ClearMesh { xform: id } | Command::RemoveAllChildren { parent: id } => {
            w.id(*id);
        }
        Command::AddChild { parent, child } | Command::RemoveChild { parent, child } => {
            w.id(*parent);
            w.id(*child);
        }
        Command::SetPosition { id, value } | Command::SetScale { id, value } => {
            w.id(*id);
            w.floats(&value.to_array());
        }
        Command::SetRotation { id, value } => {
            w.id(*id);
            w.floats(&value.to_array());
        }
        Command::SetLocalMatrix { id, matrix } => {
            w.id(*id);
            w.floats(&matrix.to_cols_array());
        }
        Command::SetMesh { xform, geometry, material } => {
            w.id(*xform);
            w.id(*geometry);
            w.id(*material);
        }
        Command::SetAmbient { scene, color } => {
            w.id(*scene);
            w.floats(&color.to_array());
        }
        Command::SetBackground { scene, color } => {
            w.id(*scene);
            w.floats(&color.to_array());
        }
        Command::SetMainCamera { scene, camera } => {
            w.id(*scene);
            w.id(*camera);
        }
        Command::SetMaterialShader { material, shader } => {
            w.id(*material);
            w.id(*shader);
        }
        Command::SetMaterialUniform { material, slot, value } => {
            w.id(*material);
            w.u32(*slot);
            w.floats(value);
        }
        Command::SetBufferData { buffer, data } => {
            w.id(*buffer);
            w.float_array(data);
        }
        Command::SetText { id, text } => {
            w.id(*id);
            w.str(text);
        }
        Command::SetCameraParams { id, fov_y, aspect, near, far } => {
            w.id(*id);
            w.floats(&[*fov_y, *aspect, *near, *far]);
        }
        Command::SetPassTargets { pass, scene, camera, next } => {
            w.id(*pass);
            w.id(*scene);
            w.id(*camera);
            w.id(*next);
        }
    }
}

/// Appends `cmd` as one record and returns the record's offset.
///
/// # Panics
/// If a single record exceeds 4 GiB.
pub fn encode(cmd: &Command, arena: &mut Arena) -> usize {
    let mut measure = Measure::default();
    write_fields(cmd, &mut measure);

    let size = HEADER_SIZE + measure.fixed + measure.tail;
    let size32 = u32::try_from(size).unwrap_or_else(|_| panic!("command record of {size} bytes"));

    let offset = arena.push_zeroed(size);
    arena.align();
    let next_offset = arena.cursor() as u64;

    arena.write_pod_at(
        offset,
        &RecordHeader {
            kind: cmd.kind() as u32,
            size: size32,
            next_offset,
        },
    );

    let mut writer = Writer {
        record: arena.bytes_mut(offset, size),
        fixed_pos: HEADER_SIZE,
        tail_pos: HEADER_SIZE + measure.fixed,
    };
    write_fields(cmd, &mut writer);
    debug_assert_eq!(writer.fixed_pos, HEADER_SIZE + measure.fixed);
    debug_assert_eq!(writer.tail_pos, size);

    offset
}

// ============================================================================
// Decoding
// ============================================================================

struct Reader<'a> {
    record: &'a [u8],
    record_offset: usize,
    pos: usize,
}

impl<'a> Reader<'a> {
    fn malformed(&self, reason: &'static str) -> GraphError {
        GraphError::MalformedRecord {
            offset: self.record_offset,
            reason,
        }
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N]> {
        let record = self.record;
        let bytes = record
            .get(self.pos..self.pos + N)
            .ok_or_else(|| self.malformed("payload shorter than its fields"))?;
        self.pos += N;
        let mut out = [0; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    fn u32(&mut self) -> Result<u32> {
        self.take::<4>().map(u32::from_ne_bytes)
    }

    fn f32(&mut self) -> Result<f32> {
        self.take::<4>().map(f32::from_ne_bytes)
    }

    fn id(&mut self) -> Result<ComponentId> {
        self.take::<8>().map(|b| ComponentId(u64::from_ne_bytes(b)))
    }

    fn floats<const N: usize>(&mut self) -> Result<[f32; N]> {
        let mut out = [0.0; N];
        for v in &mut out {
            *v = self.f32()?;
        }
        Ok(out)
    }

    fn vec3(&mut self) -> Result<Vec3> {
        self.floats::<3>().map(Vec3::from_array)
    }

    fn var(&mut self) -> Result<&'a [u8]> {
        let span: Span = bytemuck::pod_read_unaligned(&self.take::<SPAN_SIZE>()?);
        let start = span.offset as usize;
        let end = start + span.len as usize;
        if start < HEADER_SIZE {
            return Err(self.malformed("span points into the header"));
        }
        let record = self.record;
        record
            .get(start..end)
            .ok_or_else(|| self.malformed("span outside the record"))
    }

    fn string(&mut self) -> Result<String> {
        let bytes = self.var()?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| GraphError::InvalidUtf8(self.record_offset))
    }

    fn float_array(&mut self) -> Result<Vec<f32>> {
        let bytes = self.var()?;
        if bytes.len() % 4 != 0 {
            return Err(self.malformed("float array length not a multiple of 4"));
        }
        Ok(bytes
            .chunks_exact(4)
            .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }
}

/// Reads the header at `offset` and checks it against the arena bounds.
pub fn read_header(arena: &Arena, offset: usize) -> Result<RecordHeader> {
    let malformed = |reason| GraphError::MalformedRecord { offset, reason };
    let header: RecordHeader = arena
        .read_pod(offset)
        .ok_or_else(|| malformed("truncated header"))?;

    let size = header.size as usize;
    if size < HEADER_SIZE {
        return Err(malformed("size smaller than header"));
    }
    let next = usize::try_from(header.next_offset).map_err(|_| malformed("next offset overflows"))?;
    if next < offset + size || next > arena.cursor() {
        return Err(malformed("next offset out of range"));
    }
    Ok(header)
}

/// Decodes the record at `offset`. Returns the command and the offset of the
/// next record.
pub fn decode(arena: &Arena, offset: usize) -> Result<(Command, usize)> {
    let header = read_header(arena, offset)?;
    let Some(kind) = CommandKind::from_u32(header.kind) else {
        return Err(GraphError::UnknownCommand(header.kind));
    };
    let record = arena
        .bytes(offset, header.size as usize)
        .ok_or(GraphError::MalformedRecord {
            offset,
            reason: "record outside the arena",
        })?;

    let mut r = Reader {
        record,
        record_offset: offset,
        pos: HEADER_SIZE,
    };
    let cmd = decode_fields(kind, &mut r)?;
    Ok((cmd, header.next_offset as usize))
}

fn decode_fields(kind: CommandKind, r: &mut Reader<'_>) -> Result<Command> {
    use CommandKind as K;

    Ok(match kind {
        K::CreateTransform => Command::CreateTransform { id: r.id()?, name: r.string()? },
        K::CreateScene => Command::CreateScene { id: r.id()?, name: r.string()? },
        K::CreateShader => Command::CreateShader { id: r.id()?, name: r.string()? },
        K::CreatePass => Command::CreatePass { id: r.id()?, name: r.string()? },
        K::SetName => Command::SetName { id: r.id()?, name: r.string()? },
        K::CreateMesh => {
            let (id, geometry, material) = (r.id()?, r.id()?, r.id()?);
            Command::CreateMesh { id, name: r.string()?, geometry, material }
        }
        K::CreateCamera => {
            let id = r.id()?;
            let [fov_y, near, far] = r.floats()?;
            Command::CreateCamera { id, name: r.string()?, fov_y, near, far }
        }
        K::CreateLight => {
            let id = r.id()?;
            let raw = r.u32()?;
            let kind = LightKind::from_u32(raw).ok_or_else(|| r.malformed("unknown light kind"))?;
            let color = r.vec3()?;
            let intensity = r.f32()?;
            Command::CreateLight { id, name: r.string()?, kind, color, intensity }
        }
        K::CreateText => Command::CreateText { id: r.id()?, name: r.string()?, text: r.string()? },
        K::CreateGeometry => {
            let (id, vertex_count) = (r.id()?, r.u32()?);
            Command::CreateGeometry { id, name: r.string()?, vertex_count }
        }
        K::CreateMaterial => {
            let (id, shader) = (r.id()?, r.id()?);
            Command::CreateMaterial { id, name: r.string()?, shader }
        }
        K::CreateTexture => {
            let (id, width, height) = (r.id()?, r.u32()?, r.u32()?);
            Command::CreateTexture { id, name: r.string()?, width, height }
        }
        K::CreateBuffer => Command::CreateBuffer { id: r.id()?, name: r.string()?, data: r.float_array()? },
        K::Delete => Command::Delete { id: r.id()? },
        K::ClearMesh => Command::ClearMesh { xform: r.id()? },
        K::RemoveAllChildren => Command::RemoveAllChildren { parent: r.id()? },
        K::AddChild => Command::AddChild { parent: r.id()?, child: r.id()? },
        K::RemoveChild => Command::RemoveChild { parent: r.id()?, child: r.id()? },
        K::SetPosition => Command::SetPosition { id: r.id()?, value: r.vec3()? },
        K::SetScale => Command::SetScale { id: r.id()?, value: r.vec3()? },
        K::SetRotation => Command::SetRotation { id: r.id()?, value: Quat::from_array(r.floats()?) },
        K::SetLocalMatrix => Command::SetLocalMatrix { id: r.id()?, matrix: Mat4::from_cols_array(&r.floats()?) },
        K::SetMesh => Command::SetMesh { xform: r.id()?, geometry: r.id()?, material: r.id()? },
        K::SetAmbient => Command::SetAmbient { scene: r.id()?, color: r.vec3()? },
        K::SetBackground => Command::SetBackground { scene: r.id()?, color: Vec4::from_array(r.floats()?) },
        K::SetMainCamera => Command::SetMainCamera { scene: r.id()?, camera: r.id()? },
        K::SetMaterialShader => Command::SetMaterialShader { material: r.id()?, shader: r.id()? },
        K::SetMaterialUniform => Command::SetMaterialUniform { material: r.id()?, slot: r.u32()?, value: r.floats()? },
        K::SetBufferData => Command::SetBufferData { buffer: r.id()?, data: r.float_array()? },
        K::SetText => Command::SetText { id: r.id()?, text: r.string()? },
        K::SetCameraParams => {
            let id = r.id()?;
            let [fov_y, aspect, near, far] = r.floats()?;
            Command::SetCameraParams { id, fov_y, aspect, near, far }
        }
        K::SetPassTargets => Command::SetPassTargets {
            pass: r.id()?,
            scene: r.id()?,
            camera: r.id()?,
            next: r.id()?,
        },
    })
}
