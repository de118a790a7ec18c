#[derive(Clone, Debug)]
pub struct MaterialData {
    pub base_color: [f32; 4],
}

impl Default for MaterialData {
    fn default() -> Self {
        Self {
            base_color: [1.0, 1.0, 1.0, 1.0],
        }
    }
}

impl MaterialData {
    pub fn from_color(base_color: [f32; 4]) -> Self {
        Self { base_color }
    }
}
