//! Object meshes in the packed level layout.
//!
//! ```text
//! [n_verts] n_verts × (x, y, z)
//! [±n]      n > 0: n × normal (x, y, z)   n < 0: |n| × pre-lit shade
//! [n_quads] n × (v0, v1, v2, v3, texture)
//! [n_tris]  n × (v0, v1, v2, texture)
//! [n_cquads] n × (v0, v1, v2, v3, colour)
//! [n_ctris]  n × (v0, v1, v2, colour)
//! ```
//!
//! Every field is a signed 16-bit word; [`Mesh::from_le_bytes`] reads the
//! same layout straight from a little-endian byte blob.

use byteorder::{LittleEndian as LE, ReadBytesExt};
use glam::I16Vec3;

pub type MeshId = u16;

/// Texture attribute bit marking a face visible from both sides.
pub const DOUBLE_SIDED: u16 = 0x8000;

/// Polygon with `N` vertex indices and one attribute word: a texture index
/// for textured faces, a palette index for coloured ones.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Face<const N: usize> {
    pub vertices: [u16; N],
    pub attr: u16,
}

pub type Quad = Face<4>;
pub type Tri = Face<3>;

impl<const N: usize> Face<N> {
    pub fn new(vertices: [u16; N], attr: u16) -> Self {
        Self { vertices, attr }
    }

    /// Attribute without the double-sided bit.
    #[inline]
    pub fn texture(&self) -> u16 {
        self.attr & !DOUBLE_SIDED
    }

    #[inline]
    pub fn double_sided(&self) -> bool {
        self.attr & DOUBLE_SIDED != 0
    }
}

/// Per-vertex lighting input carried by the mesh.
#[derive(Clone, Debug, PartialEq)]
pub enum MeshShading {
    /// Unit normals scaled to `1 << 14`; lit by the light engine.
    Normals(Vec<I16Vec3>),
    /// Pre-baked shade per vertex (`0..=0x1FFF`, larger is darker).
    Lights(Vec<i16>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<I16Vec3>,
    pub shading: MeshShading,
    pub tex_quads: Vec<Quad>,
    pub tex_tris: Vec<Tri>,
    pub col_quads: Vec<Quad>,
    pub col_tris: Vec<Tri>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MeshError {
    #[error("mesh record truncated at word {0}")]
    Truncated(usize),

    #[error("negative count {count} at word {at}")]
    BadCount { count: i16, at: usize },

    #[error("{got} shading entries for {expected} vertices")]
    ShadingMismatch { got: usize, expected: usize },

    #[error("face references vertex {index}, mesh has {count}")]
    BadIndex { index: u16, count: usize },
}

/// Bounds-checked cursor over a word slice.
struct Words<'a> {
    data: &'a [i16],
    pos: usize,
}

impl<'a> Words<'a> {
    fn next(&mut self) -> Result<i16, MeshError> {
        let w = *self.data.get(self.pos).ok_or(MeshError::Truncated(self.pos))?;
        self.pos += 1;
        Ok(w)
    }

    fn count(&mut self) -> Result<usize, MeshError> {
        let at = self.pos;
        let n = self.next()?;
        if n < 0 {
            return Err(MeshError::BadCount { count: n, at });
        }
        Ok(n as usize)
    }

    fn vec3(&mut self) -> Result<I16Vec3, MeshError> {
        Ok(I16Vec3::new(self.next()?, self.next()?, self.next()?))
    }

    fn faces<const N: usize>(&mut self) -> Result<Vec<Face<N>>, MeshError> {
        let n = self.count()?;
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            let mut vertices = [0u16; N];
            for v in &mut vertices {
                *v = self.next()? as u16;
            }
            out.push(Face::new(vertices, self.next()? as u16));
        }
        Ok(out)
    }
}

impl Mesh {
    /// Decode one mesh record; trailing words are ignored.
    pub fn decode(words: &[i16]) -> Result<Self, MeshError> {
        let mut w = Words { data: words, pos: 0 };

        let n_verts = w.count()?;
        let mut vertices = Vec::with_capacity(n_verts);
        for _ in 0..n_verts {
            vertices.push(w.vec3()?);
        }

        let n_shade = w.next()?;
        let shading = if n_shade >= 0 {
            let mut normals = Vec::with_capacity(n_shade as usize);
            for _ in 0..n_shade {
                normals.push(w.vec3()?);
            }
            MeshShading::Normals(normals)
        } else {
            let n = n_shade.unsigned_abs() as usize;
            let mut lights = Vec::with_capacity(n);
            for _ in 0..n {
                lights.push(w.next()?);
            }
            MeshShading::Lights(lights)
        };

        let mesh = Mesh {
            vertices,
            shading,
            tex_quads: w.faces()?,
            tex_tris: w.faces()?,
            col_quads: w.faces()?,
            col_tris: w.faces()?,
        };
        mesh.validate()?;
        Ok(mesh)
    }

    /// Same layout from a little-endian byte blob.
    pub fn from_le_bytes(bytes: &[u8]) -> Result<Self, MeshError> {
        let mut cursor = bytes;
        let mut words = Vec::with_capacity(bytes.len() / 2);
        while let Ok(w) = cursor.read_i16::<LE>() {
            words.push(w);
        }
        Self::decode(&words)
    }

    fn validate(&self) -> Result<(), MeshError> {
        let count = self.vertices.len();
        let shade_len = match &self.shading {
            MeshShading::Normals(n) => n.len(),
            MeshShading::Lights(l) => l.len(),
        };
        if shade_len != count {
            return Err(MeshError::ShadingMismatch {
                got: shade_len,
                expected: count,
            });
        }

        let quads = self.tex_quads.iter().chain(&self.col_quads);
        let tris = self.tex_tris.iter().chain(&self.col_tris);
        let indices = quads
            .flat_map(|q| q.vertices)
            .chain(tris.flat_map(|t| t.vertices));
        for index in indices {
            if index as usize >= count {
                return Err(MeshError::BadIndex { index, count });
            }
        }
        Ok(())
    }

    /// Encode back into the packed word layout.
    pub fn encode(&self) -> Vec<i16> {
        let mut out = vec![self.vertices.len() as i16];
        for v in &self.vertices {
            out.extend([v.x, v.y, v.z]);
        }
        match &self.shading {
            MeshShading::Normals(normals) => {
                out.push(normals.len() as i16);
                for n in normals {
                    out.extend([n.x, n.y, n.z]);
                }
            }
            MeshShading::Lights(lights) => {
                out.push(-(lights.len() as i16));
                out.extend(lights.iter().copied());
            }
        }
        fn faces<const N: usize>(out: &mut Vec<i16>, faces: &[Face<N>]) {
            out.push(faces.len() as i16);
            for f in faces {
                out.extend(f.vertices.iter().map(|&v| v as i16));
                out.push(f.attr as i16);
            }
        }
        faces(&mut out, &self.tex_quads);
        faces(&mut out, &self.tex_tris);
        faces(&mut out, &self.col_quads);
        faces(&mut out, &self.col_tris);
        out
    }
}
