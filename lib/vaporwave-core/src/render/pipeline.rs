use crate::config::Config;
use crate::overlay::VISIBLE_OPACITY;
use crate::platform::PixelBuffer;
use crate::render::{FrameSnapshot, RenderError};
use skia_safe::{
    images, surfaces, AlphaType, Canvas, Color, ColorType, Data, ISize, Image, ImageInfo, Paint,
    Rect, RuntimeEffect, Surface,
};
use std::fs;
use std::sync::Arc;

pub const BUILTIN_EFFECT: &str = include_str!("vaporwave.sksl");

/// Uniforms every effect must declare, with their sizes in bytes.
const UNIFORMS: [(&str, usize); 5] = [
    ("time", 4),
    ("opacity", 4),
    ("has_texture", 4),
    ("seed", 4),
    ("resolution", 8),
];

/// The compiled effect. Built once on the render thread and shared by every overlay.
pub struct RenderPipeline {
    effect: RuntimeEffect,
    offsets: [usize; UNIFORMS.len()],
    texture_mix: f32,
}

impl RenderPipeline {
    pub fn compile(source: &str, texture_mix: f32) -> Result<Self, RenderError> {
        let effect = RuntimeEffect::make_for_shader(source, None).map_err(RenderError::Compile)?;

        let mut offsets = [0; UNIFORMS.len()];
        for (slot, (name, size)) in UNIFORMS.iter().enumerate() {
            let uniform = effect
                .uniforms()
                .iter()
                .find(|u| u.name() == *name)
                .ok_or_else(|| RenderError::UniformLayout(format!("missing uniform '{name}'")))?;

            if uniform.size_in_bytes() != *size {
                return Err(RenderError::UniformLayout(format!(
                    "'{name}' is {} bytes, expected {size}",
                    uniform.size_in_bytes()
                )));
            }
            offsets[slot] = uniform.offset();
        }

        let expected: usize = UNIFORMS.iter().map(|(_, size)| size).sum();
        if effect.uniform_size() != expected {
            return Err(RenderError::UniformLayout(format!(
                "uniform block is {} bytes, expected {expected}",
                effect.uniform_size()
            )));
        }

        Ok(Self {
            effect,
            offsets,
            texture_mix: texture_mix.clamp(0.0, 1.0),
        })
    }

    /// Compiles the configured effect, or the built-in one when none is set.
    pub fn from_config(config: &Config) -> Result<Self, RenderError> {
        match &config.shader_path {
            Some(path) => {
                let source = fs::read_to_string(path).map_err(|source| RenderError::Source {
                    path: path.clone(),
                    source,
                })?;
                Self::compile(&source, config.texture_mix)
            }
            None => Self::compile(BUILTIN_EFFECT, config.texture_mix),
        }
    }

    pub fn set_texture_mix(&mut self, texture_mix: f32) {
        self.texture_mix = texture_mix.clamp(0.0, 1.0);
    }

    fn uniforms(&self, frame: &FrameSnapshot, width: f32, height: f32) -> Vec<u8> {
        let values: [&[f32]; UNIFORMS.len()] = [
            &[frame.elapsed.as_secs_f32() * 1000.0],
            &[frame.opacity],
            &[if frame.texture.is_some() { 1.0 } else { 0.0 }],
            &[frame.seed],
            &[width, height],
        ];

        let mut bytes = vec![0u8; self.effect.uniform_size()];
        for (offset, floats) in self.offsets.iter().zip(values) {
            for (i, value) in floats.iter().enumerate() {
                let start = offset + i * 4;
                bytes[start..start + 4].copy_from_slice(&value.to_ne_bytes());
            }
        }
        bytes
    }

    /// Draws the captured image (if any) faded by `texture_mix`, then the effect on top.
    pub fn draw(
        &self,
        canvas: &Canvas,
        frame: &FrameSnapshot,
        texture: Option<&Image>,
    ) -> Result<(), RenderError> {
        let (width, height) = frame.size.to_pixels();
        let rect = Rect::from_wh(width as f32, height as f32);

        if let Some(image) = texture {
            let mut paint = Paint::default();
            paint.set_alpha_f(self.texture_mix * frame.opacity);
            canvas.draw_image_rect(image, None, rect, &paint);
        }

        let uniforms = self.uniforms(frame, width as f32, height as f32);
        let shader = self
            .effect
            .make_shader(Data::new_copy(&uniforms), &[], None)
            .ok_or_else(|| RenderError::UniformLayout("effect rejected its uniforms".into()))?;

        let mut paint = Paint::default();
        paint.set_shader(shader);
        canvas.draw_rect(rect, &paint);
        Ok(())
    }
}

/// A CPU surface for one overlay, plus the decoded form of its latest capture.
pub(crate) struct RasterTarget {
    surface: Surface,
    size: (u32, u32),
    texture: Option<(Arc<PixelBuffer>, Image)>,
}

impl RasterTarget {
    pub fn new(size: (u32, u32)) -> Result<Self, RenderError> {
        Ok(Self {
            surface: allocate(size)?,
            size,
            texture: None,
        })
    }

    fn ensure_size(&mut self, size: (u32, u32)) -> Result<(), RenderError> {
        if size != self.size {
            self.surface = allocate(size)?;
            self.size = size;
        }
        Ok(())
    }

    fn texture_image(&mut self, texture: Option<&Arc<PixelBuffer>>) -> Option<Image> {
        let texture = texture?;
        if let Some((cached, image)) = &self.texture {
            if Arc::ptr_eq(cached, texture) {
                return Some(image.clone());
            }
        }

        let image = image_from_pixels(texture)?;
        self.texture = Some((texture.clone(), image.clone()));
        Some(image)
    }

    /// Renders `frame` and reads the pixels back for presentation.
    pub fn render(
        &mut self,
        pipeline: &RenderPipeline,
        frame: &FrameSnapshot,
    ) -> Result<PixelBuffer, RenderError> {
        let size = frame.size.to_pixels();
        self.ensure_size(size)?;
        let texture = self.texture_image(frame.texture.as_ref());

        let canvas = self.surface.canvas();
        canvas.clear(Color::TRANSPARENT);
        if frame.opacity as f64 >= VISIBLE_OPACITY {
            pipeline.draw(canvas, frame, texture.as_ref())?;
        }

        let (width, height) = size;
        let info = bgra_info(width, height);
        let row_bytes = width as usize * 4;
        let mut pixels = vec![0u8; row_bytes * height as usize];
        if !self
            .surface
            .read_pixels(&info, &mut pixels, row_bytes, (0, 0))
        {
            return Err(RenderError::Readback { width, height });
        }

        Ok(PixelBuffer {
            width,
            height,
            row_bytes,
            pixels,
        })
    }
}

fn allocate((width, height): (u32, u32)) -> Result<Surface, RenderError> {
    surfaces::raster_n32_premul(ISize::new(width as i32, height as i32))
        .ok_or(RenderError::Surface { width, height })
}

fn bgra_info(width: u32, height: u32) -> ImageInfo {
    ImageInfo::new(
        ISize::new(width as i32, height as i32),
        ColorType::BGRA8888,
        AlphaType::Premul,
        None,
    )
}

fn image_from_pixels(buffer: &PixelBuffer) -> Option<Image> {
    images::raster_from_data(
        &bgra_info(buffer.width, buffer.height),
        Data::new_copy(&buffer.pixels),
        buffer.row_bytes,
    )
}
