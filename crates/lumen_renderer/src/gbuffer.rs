use wgpu::{Device, Extent3d, TextureDescriptor, TextureDimension, TextureFormat, TextureUsages};

pub const ALBEDO_FORMAT: TextureFormat = TextureFormat::Rgba8Unorm;
pub const NORMAL_FORMAT: TextureFormat = TextureFormat::Rgba16Float;
/// Full precision: half floats band visibly once world coordinates pass a few
/// hundred units, and the lighting pass derives cluster depth from this.
pub const POSITION_FORMAT: TextureFormat = TextureFormat::Rgba32Float;
pub const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;

pub const COLOR_FORMATS: [TextureFormat; 3] = [ALBEDO_FORMAT, NORMAL_FORMAT, POSITION_FORMAT];

pub struct Attachment {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

impl Attachment {
    fn new(device: &Device, width: u32, height: u32, format: TextureFormat, label: &str) -> Self {
        let texture = device.create_texture(&TextureDescriptor {
            label: Some(label),
            size: Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format,
            usage: TextureUsages::RENDER_ATTACHMENT | TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }
}

/// Geometry pass outputs, sized to the surface. Recreated on resize.
pub struct GBuffer {
    pub albedo: Attachment,
    pub normal: Attachment,
    pub position: Attachment,
    pub depth: Attachment,
    pub width: u32,
    pub height: u32,
}

impl GBuffer {
    pub fn new(device: &Device, width: u32, height: u32) -> Self {
        let (width, height) = (width.max(1), height.max(1));
        Self {
            albedo: Attachment::new(device, width, height, ALBEDO_FORMAT, "G-Buffer Albedo"),
            normal: Attachment::new(device, width, height, NORMAL_FORMAT, "G-Buffer Normal"),
            position: Attachment::new(device, width, height, POSITION_FORMAT, "G-Buffer Position"),
            depth: Attachment::new(device, width, height, DEPTH_FORMAT, "G-Buffer Depth"),
            width,
            height,
        }
    }

    /// Color attachments in shader output order, all cleared to zero.
    pub fn color_attachments(&self) -> [Option<wgpu::RenderPassColorAttachment<'_>>; 3] {
        [&self.albedo, &self.normal, &self.position].map(|attachment| {
            Some(wgpu::RenderPassColorAttachment {
                view: &attachment.view,
                resolve_target: None,
                depth_slice: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
            })
        })
    }

    pub fn depth_attachment(&self) -> wgpu::RenderPassDepthStencilAttachment<'_> {
        wgpu::RenderPassDepthStencilAttachment {
            view: &self.depth.view,
            depth_ops: Some(wgpu::Operations {
                load: wgpu::LoadOp::Clear(1.0), // Clear to "Far" (1.0)
                store: wgpu::StoreOp::Store,
            }),
            stencil_ops: None,
        }
    }

    pub fn destroy(&self) {
        for attachment in [&self.albedo, &self.normal, &self.position, &self.depth] {
            attachment.texture.destroy();
        }
    }
}
