/// debug label 使用的预定义颜色
pub struct LabelColor;

impl LabelColor {
    pub const COLOR_PASS: [f32; 4] = [0.3, 0.6, 0.9, 1.0];
    pub const COLOR_CMD: [f32; 4] = [0.5, 0.8, 0.3, 1.0];
    pub const COLOR_STAGE: [f32; 4] = [0.9, 0.7, 0.2, 1.0];
}
