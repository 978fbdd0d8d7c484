//! Window capture module for querying focus and grabbing pixels.
//!
//! This module defines the capability traits the sampling loop depends on
//! and an X11 implementation of both, so the core loop never touches a
//! concrete windowing library.

use crate::color::Rgb;
use crate::error::{CaptureError, DisplayError};
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{ConnectionExt as _, ImageFormat};
use x11rb::rust_connection::RustConnection;

/// X11 `GetInputFocus` pseudo-focus meaning "pointer root" rather than a
/// concrete window; it cannot be captured and is treated as no focus.
const POINTER_ROOT_FOCUS: u32 = 1;

/// Bytes per pixel for the ZPixmap replies we accept (BGRx, 24/32-bit depth).
const ZPIXMAP_BYTES_PER_PIXEL: usize = 4;

/// The currently focused window and its dimensions at query time.
///
/// Valid for a single sampling tick only: focus and geometry can both change
/// between ticks, so the loop re-queries every iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FocusedWindow {
    /// Opaque window id in the windowing system.
    pub id: u32,
    /// Window width in pixels at query time.
    pub width: u32,
    /// Window height in pixels at query time.
    pub height: u32,
}

/// Queries which window currently holds input focus.
pub trait FocusTracker {
    /// Return the focused window and its current dimensions, or `Ok(None)`
    /// when no window holds focus. The latter is an observable condition,
    /// not an error.
    fn current_focus(&self) -> Result<Option<FocusedWindow>, CaptureError>;
}

/// Captures the pixel region of a window at full resolution.
pub trait PixelSource {
    /// Capture the full window region. Fails with [`CaptureError`] if the
    /// window became unreadable between the focus query and this call; the
    /// caller skips the tick and continues.
    fn capture(&self, window: &FocusedWindow) -> Result<PixelBuffer, CaptureError>;
}

/// Channel layout of the raw bytes behind a [`PixelBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChannelOrder {
    /// 4 bytes per pixel, little-endian ZPixmap order (blue first, pad last).
    Bgrx,
    /// 3 bytes per pixel, packed red-green-blue.
    Rgb,
}

/// A captured rectangle of pixels with per-pixel channel access in the
/// unscaled coordinate space.
#[derive(Debug, Clone)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    order: ChannelOrder,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Wrap a raw ZPixmap reply. Only 32-bit-per-pixel data (the BGRx layout
    /// used for 24- and 32-bit depth visuals) is accepted; other layouts are
    /// reported rather than silently mis-decoded.
    pub fn from_zpixmap(width: u32, height: u32, data: Vec<u8>) -> Result<Self, CaptureError> {
        let pixels = width as usize * height as usize;
        let expected = pixels * ZPIXMAP_BYTES_PER_PIXEL;

        if data.len() < expected {
            return Err(CaptureError::ShortImage {
                got: data.len(),
                expected,
                width,
                height,
            });
        }
        if pixels > 0 && data.len() / pixels != ZPIXMAP_BYTES_PER_PIXEL {
            return Err(CaptureError::UnsupportedFormat {
                bytes_per_pixel: data.len() / pixels,
            });
        }

        Ok(Self {
            width,
            height,
            order: ChannelOrder::Bgrx,
            data,
        })
    }

    /// Build a buffer from packed RGB pixels in row-major order.
    ///
    /// `pixels.len()` must equal `width * height`.
    pub fn from_rgb_pixels(width: u32, height: u32, pixels: &[Rgb]) -> Self {
        assert_eq!(
            pixels.len(),
            width as usize * height as usize,
            "pixel count must match dimensions"
        );
        let mut data = Vec::with_capacity(pixels.len() * 3);
        for px in pixels {
            data.extend_from_slice(&[px.r, px.g, px.b]);
        }
        Self {
            width,
            height,
            order: ChannelOrder::Rgb,
            data,
        }
    }

    /// Buffer width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Buffer height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Extract the pixel at `(x, y)` in unscaled coordinates.
    ///
    /// Callers must stay in bounds; the averager's sampling grid guarantees
    /// this by construction.
    pub fn pixel(&self, x: u32, y: u32) -> Rgb {
        debug_assert!(x < self.width && y < self.height);
        let idx = y as usize * self.width as usize + x as usize;
        match self.order {
            ChannelOrder::Bgrx => {
                let base = idx * ZPIXMAP_BYTES_PER_PIXEL;
                Rgb::new(self.data[base + 2], self.data[base + 1], self.data[base])
            }
            ChannelOrder::Rgb => {
                let base = idx * 3;
                Rgb::new(self.data[base], self.data[base + 1], self.data[base + 2])
            }
        }
    }
}

/// X11 implementation of [`FocusTracker`] and [`PixelSource`].
///
/// Holds a single synchronous connection to the X server for the lifetime of
/// the daemon. All per-tick request failures map to [`CaptureError`]; only
/// the initial connection failure is fatal.
pub struct X11Capture {
    conn: RustConnection,
}

impl X11Capture {
    /// Connect to the default X display.
    pub fn connect() -> Result<Self, DisplayError> {
        let (conn, screen_num) = x11rb::connect(None)?;
        if conn.setup().roots.get(screen_num).is_none() {
            return Err(DisplayError::NoScreen(screen_num));
        }
        Ok(Self { conn })
    }
}

impl FocusTracker for X11Capture {
    fn current_focus(&self) -> Result<Option<FocusedWindow>, CaptureError> {
        let focus = self.conn.get_input_focus()?.reply()?.focus;
        if focus == x11rb::NONE || focus == POINTER_ROOT_FOCUS {
            return Ok(None);
        }

        // Geometry is queried right after focus so a subsequent capture is
        // consistent with the reported size; a resize in between is an
        // accepted race handled by the capture call itself.
        let geometry = self.conn.get_geometry(focus)?.reply()?;
        Ok(Some(FocusedWindow {
            id: focus,
            width: u32::from(geometry.width),
            height: u32::from(geometry.height),
        }))
    }
}

impl PixelSource for X11Capture {
    fn capture(&self, window: &FocusedWindow) -> Result<PixelBuffer, CaptureError> {
        let reply = self
            .conn
            .get_image(
                ImageFormat::Z_PIXMAP,
                window.id,
                0,
                0,
                window.width as u16,
                window.height as u16,
                u32::MAX,
            )?
            .reply()?;
        PixelBuffer::from_zpixmap(window.width, window.height, reply.data)
    }
}
