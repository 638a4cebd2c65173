//! stage / access flags 的可读格式化，执行计划日志使用

use ash::vk;

/// 将 PipelineStageFlags2 格式化为可读字符串
pub fn format_stage_flags(stage: vk::PipelineStageFlags2) -> String {
    const NAMES: &[(vk::PipelineStageFlags2, &str)] = &[
        (vk::PipelineStageFlags2::TOP_OF_PIPE, "TOP_OF_PIPE"),
        (vk::PipelineStageFlags2::BOTTOM_OF_PIPE, "BOTTOM_OF_PIPE"),
        (vk::PipelineStageFlags2::DRAW_INDIRECT, "DRAW_INDIRECT"),
        (vk::PipelineStageFlags2::VERTEX_SHADER, "VERTEX_SHADER"),
        (vk::PipelineStageFlags2::FRAGMENT_SHADER, "FRAGMENT_SHADER"),
        (vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT, "COLOR_ATTACHMENT_OUTPUT"),
        (vk::PipelineStageFlags2::COMPUTE_SHADER, "COMPUTE_SHADER"),
        (vk::PipelineStageFlags2::TRANSFER, "TRANSFER"),
        (vk::PipelineStageFlags2::ALL_COMMANDS, "ALL_COMMANDS"),
    ];

    let names: Vec<&str> = NAMES.iter().filter(|(flag, _)| stage.contains(*flag)).map(|(_, name)| *name).collect();
    if names.is_empty() { format!("{:?}", stage) } else { names.join(" | ") }
}

/// 将 AccessFlags2 格式化为可读字符串
pub fn format_access_flags(access: vk::AccessFlags2) -> String {
    if access == vk::AccessFlags2::NONE {
        return "NONE".to_string();
    }

    const NAMES: &[(vk::AccessFlags2, &str)] = &[
        (vk::AccessFlags2::INDIRECT_COMMAND_READ, "INDIRECT_CMD_READ"),
        (vk::AccessFlags2::UNIFORM_READ, "UNIFORM_READ"),
        (vk::AccessFlags2::SHADER_SAMPLED_READ, "SHADER_SAMPLED_READ"),
        (vk::AccessFlags2::SHADER_STORAGE_READ, "STORAGE_READ"),
        (vk::AccessFlags2::SHADER_STORAGE_WRITE, "STORAGE_WRITE"),
        (vk::AccessFlags2::COLOR_ATTACHMENT_READ, "COLOR_ATTACH_READ"),
        (vk::AccessFlags2::COLOR_ATTACHMENT_WRITE, "COLOR_ATTACH_WRITE"),
        (vk::AccessFlags2::TRANSFER_READ, "TRANSFER_READ"),
        (vk::AccessFlags2::TRANSFER_WRITE, "TRANSFER_WRITE"),
        (vk::AccessFlags2::HOST_WRITE, "HOST_WRITE"),
        (vk::AccessFlags2::MEMORY_READ, "MEMORY_READ"),
        (vk::AccessFlags2::MEMORY_WRITE, "MEMORY_WRITE"),
    ];

    let names: Vec<&str> = NAMES.iter().filter(|(flag, _)| access.contains(*flag)).map(|(_, name)| *name).collect();
    if names.is_empty() { format!("{:?}", access) } else { names.join(" | ") }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_stage_flags() {
        assert_eq!(format_stage_flags(vk::PipelineStageFlags2::COMPUTE_SHADER), "COMPUTE_SHADER");
        assert_eq!(
            format_stage_flags(vk::PipelineStageFlags2::COMPUTE_SHADER | vk::PipelineStageFlags2::TRANSFER),
            "COMPUTE_SHADER | TRANSFER"
        );
    }

    #[test]
    fn test_format_access_flags() {
        assert_eq!(format_access_flags(vk::AccessFlags2::NONE), "NONE");
        assert_eq!(
            format_access_flags(vk::AccessFlags2::SHADER_STORAGE_READ | vk::AccessFlags2::SHADER_STORAGE_WRITE),
            "STORAGE_READ | STORAGE_WRITE"
        );
    }
}
