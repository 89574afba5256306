use bevy::{prelude::*, reflect::TypeUuid};

pub const TILE_LAYER_SHADER_HANDLE: HandleUntyped =
    HandleUntyped::weak_from_u64(Shader::TYPE_UUID, 9823476129834701263);
