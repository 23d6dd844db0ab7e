// Texture pages and palette consumed by the backends.
// Faces and sprites reference pages through `TextureId` only.

use std::collections::HashMap;

use std::ops::{Index, IndexMut};

/// Runtime handle for a page in this bank.
///
/// *Guaranteed* to remain stable for the lifetime of the bank.
pub type TextureId = u16;

/// `TextureId` whose texels are the checkerboard fallback.
/// Always = 0 because `TextureBank::new()` inserts it first.
pub const NO_TEXTURE: TextureId = 0;

/// Texel value treated as a hole by colour-keyed draws.
pub const COLOR_KEY: u8 = 0;

/// Side of a full texture page.
pub const PAGE_SIZE: usize = 256;

/// One page of 8-bit palette indices in row-major order.
#[derive(Clone, Debug, PartialEq)]
pub struct TexturePage {
    pub name: String,
    pub w: usize,
    pub h: usize,
    pub pixels: Vec<u8>,
}

impl TexturePage {
    /// Texel at `(u, v)`, wrapping outside the page.
    #[inline]
    pub fn texel(&self, u: i32, v: i32) -> u8 {
        let x = u.rem_euclid(self.w as i32) as usize;
        let y = v.rem_euclid(self.h as i32) as usize;
        self.pixels[y * self.w + x]
    }
}

/// Convenience checkerboard 8×8 (two grey palette entries).
impl Default for TexturePage {
    fn default() -> Self {
        const LIGHT_IDX: u8 = 8;
        const DARK_IDX: u8 = 16;
        let mut pix = vec![0u8; 8 * 8];
        for y in 0..8 {
            for x in 0..8 {
                pix[y * 8 + x] = if (x ^ y) & 1 == 0 {
                    LIGHT_IDX
                } else {
                    DARK_IDX
                };
            }
        }
        TexturePage {
            name: "CHECKER".to_string(),
            w: 8,
            h: 8,
            pixels: pix,
        }
    }
}

/// Things that can go wrong when using the bank.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TextureError {
    /// Attempted to insert a second page with an existing name.
    #[error("texture page `{0}` already present in bank")]
    Duplicate(String),

    /// Requested ID is outside `0 .. bank.len()`.
    #[error("texture page id {0} out of range")]
    BadId(TextureId),

    #[error("page `{name}` is {w}x{h} but holds {len} texels")]
    BadSize {
        name: String,
        w: usize,
        h: usize,
        len: usize,
    },
}

/// 256 colours, 0x00RRGGBB.
#[derive(Clone)]
pub struct Palette(pub [u32; 256]);
impl Default for Palette {
    /// Grey ramp.
    fn default() -> Self {
        let mut p = [0u32; 256];
        for (i, c) in p.iter_mut().enumerate() {
            let g = i as u32;
            *c = (g << 16) | (g << 8) | g;
        }
        Palette(p)
    }
}
impl Index<usize> for Palette {
    type Output = u32;
    fn index(&self, idx: usize) -> &u32 {
        &self.0[idx]
    }
}
impl IndexMut<usize> for Palette {
    fn index_mut(&mut self, idx: usize) -> &mut u32 {
        &mut self.0[idx]
    }
}

/// Named texture pages plus the shared palette.
///
/// * Stores exactly one copy of every name.
/// * ID **0** is always the "missing" checkerboard.
pub struct TextureBank {
    by_name: HashMap<String, TextureId>,
    data: Vec<TexturePage>,
    palette: Palette,
}

impl Default for TextureBank {
    fn default() -> Self {
        Self::default_with_checker()
    }
}

impl TextureBank {
    /// Create a bank whose page 0 is `missing`, used whenever a lookup
    /// falls outside the bank.
    pub fn new(missing: TexturePage) -> Self {
        let mut by_name = HashMap::new();
        by_name.insert("MISSING".into(), NO_TEXTURE);
        Self {
            by_name,
            data: vec![missing],
            palette: Palette::default(),
        }
    }

    pub fn default_with_checker() -> Self {
        Self::new(TexturePage::default())
    }

    pub fn set_palette(&mut self, palette: Palette) {
        self.palette = palette;
    }

    #[inline]
    pub fn color(&self, index: u8) -> u32 {
        self.palette[index as usize]
    }

    /// Number of pages stored (including the "missing" one).
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.len() == 1
    } // only checker

    pub fn id(&self, name: &str) -> Option<TextureId> {
        self.by_name.get(name).copied()
    }

    pub fn page(&self, id: TextureId) -> Result<&TexturePage, TextureError> {
        self.data.get(id as usize).ok_or(TextureError::BadId(id))
    }

    /// Fallback-safe lookup: unknown ids resolve to the checkerboard.
    #[inline]
    pub fn page_or_missing(&self, id: TextureId) -> &TexturePage {
        self.data
            .get(id as usize)
            .unwrap_or(&self.data[NO_TEXTURE as usize])
    }

    /// Insert a page under `name`.
    pub fn insert<S: Into<String>>(
        &mut self,
        name: S,
        page: TexturePage,
    ) -> Result<TextureId, TextureError> {
        let name = name.into();
        if self.by_name.contains_key(&name) {
            return Err(TextureError::Duplicate(name));
        }
        if page.w == 0 || page.h == 0 || page.pixels.len() != page.w * page.h {
            return Err(TextureError::BadSize {
                name,
                w: page.w,
                h: page.h,
                len: page.pixels.len(),
            });
        }
        let id = self.data.len() as TextureId;
        self.data.push(page);
        self.by_name.insert(name, id);
        Ok(id)
    }
}

/*======================================================================*/
/*                               Tests                                  */
/*======================================================================*/
#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_page(color: u8) -> TexturePage {
        TexturePage {
            name: "Dummy".to_string(),
            w: 2,
            h: 2,
            pixels: vec![color; 4],
        }
    }

    #[test]
    fn insert_and_lookup() {
        let mut bank = TextureBank::default_with_checker();
        let red = bank.insert("RED", dummy_page(0x00)).unwrap();
        let blue = bank.insert("BLUE", dummy_page(0xFF)).unwrap();

        assert_ne!(red, NO_TEXTURE);
        assert_ne!(blue, red);
        assert_eq!(bank.id("RED"), Some(red));
        assert_eq!(bank.id("NOPE"), None);
        assert_eq!(bank.page(blue).unwrap().pixels[0], 0xFF);
    }

    #[test]
    fn duplicate_name_rejected() {
        let mut bank = TextureBank::default_with_checker();
        bank.insert("WOOD", dummy_page(1)).unwrap();
        let err = bank.insert("WOOD", dummy_page(2)).unwrap_err();
        assert_eq!(err, TextureError::Duplicate("WOOD".into()));
        // checker + first WOOD
        assert_eq!(bank.len(), 2);
    }

    #[test]
    fn bad_id_falls_back_to_checker() {
        let bank = TextureBank::default_with_checker();
        let bad = TextureId::MAX;
        assert_eq!(bank.page(bad).unwrap_err(), TextureError::BadId(bad));
        assert_eq!(bank.page_or_missing(bad).name, "CHECKER");
    }

    #[test]
    fn texel_wraps() {
        let page = TexturePage::default();
        assert_eq!(page.texel(0, 0), page.texel(8, -8));
        assert_ne!(page.texel(0, 0), page.texel(1, 0));
    }

    #[test]
    fn short_page_rejected() {
        let mut bank = TextureBank::default_with_checker();
        let mut p = dummy_page(3);
        p.pixels.pop();
        assert!(matches!(
            bank.insert("SHORT", p),
            Err(TextureError::BadSize { len: 3, .. })
        ));
    }
}
