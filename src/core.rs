/// Wire protocol version spoken and advertised by this server.
pub const PROTOCOL_VERSION: u8 = 1;
/// Highest protocol version a client may claim. Informational only; unknown versions are decoded.
pub const MAX_PROTOCOL_VERSION: u8 = 1;
/// Prefix of every discovery announcement.
pub const PROTOCOL_PREAMBLE: &str = "pixelvloed";
/// Server release, shown in the window title.
pub const SERVER_VERSION: f32 = 0.4;

/// Bytes before the first pixel record: `has_alpha`, `protocol_version`.
pub const HEADER_LEN: usize = 2;
/// `x:u16, y:u16, r, g, b`.
pub const RECORD_LEN_RGB: usize = 7;
/// `x:u16, y:u16, r, g, b, a`.
pub const RECORD_LEN_RGBA: usize = 8;

/// Packed `0x00RRGGBB` cell value.
pub type PackedRgb = u32;

/// One decoded pixel paint command.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PixelUpdate {
    pub x: u16,
    pub y: u16,
    pub r: u8,
    pub g: u8,
    pub b: u8,
    /// 255 when the packet carries no alpha channel.
    pub a: u8,
}

impl PixelUpdate {
    pub fn opaque(x: u16, y: u16, r: u8, g: u8, b: u8) -> Self {
        Self {
            x,
            y,
            r,
            g,
            b,
            a: u8::MAX,
        }
    }

    pub fn is_opaque(self) -> bool {
        self.a == u8::MAX
    }
}

pub fn pack_rgb(r: u8, g: u8, b: u8) -> PackedRgb {
    (u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b)
}

pub fn unpack_rgb(v: PackedRgb) -> (u8, u8, u8) {
    ((v >> 16) as u8, (v >> 8) as u8, v as u8)
}
