use bevy::asset::{AssetLoader, LoadContext, io::Reader};
use bevy::ecs::system::{SystemParamItem, lifetimeless::SRes};
use bevy::prelude::*;
use bevy::render::extract_resource::{ExtractResource, ExtractResourcePlugin};
use bevy::render::render_asset::{PrepareAssetError, RenderAsset, RenderAssetPlugin};
use bevy::render::render_resource::*;
use bevy::render::renderer::RenderDevice;
use bytemuck::{Pod, Zeroable};
use serde::Deserialize;

use crate::error::SlimeLoaderError;

/// The value the compute shader increments.
///
/// Layout mirrors `Slime` in `shaders/simple.wgsl`: one `f32` padded out to 16 bytes.
#[derive(
    Asset, TypePath, ShaderType, Pod, Zeroable, Deserialize, Debug, Clone, Copy, Default, PartialEq,
)]
#[repr(C)]
#[serde(default)]
pub struct Slime {
    pub value: f32,
    pub _padding0: f32,
    pub _padding1: f32,
    pub _padding2: f32,
}

impl Slime {
    pub fn with_value(value: f32) -> Self {
        Self {
            value,
            ..Self::zeroed()
        }
    }

    /// Parse the RON body of a `.slime` file
    pub fn from_ron_bytes(bytes: &[u8]) -> Result<Self, SlimeLoaderError> {
        Ok(ron::de::from_bytes::<Slime>(bytes)?)
    }
}

/// Loads `.slime` files, e.g. `(value: 3.0)`
#[derive(Default)]
pub struct SlimeLoader;

impl AssetLoader for SlimeLoader {
    type Asset = Slime;
    type Settings = ();
    type Error = SlimeLoaderError;

    async fn load(
        &self,
        reader: &mut dyn Reader,
        _settings: &(),
        load_context: &mut LoadContext<'_>,
    ) -> Result<Self::Asset, Self::Error> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).await?;
        let slime = Slime::from_ron_bytes(&bytes)?;
        debug!("Loaded slime {:?} from {}", slime, load_context.path().display());
        Ok(slime)
    }

    fn extensions(&self) -> &[&str] {
        &["slime"]
    }
}

/// Render-world storage buffer for a [`Slime`]
#[derive(Debug, Clone)]
pub struct GpuSlime {
    pub buffer: Buffer,
}

impl RenderAsset for GpuSlime {
    type SourceAsset = Slime;
    type Param = SRes<RenderDevice>;

    fn prepare_asset(
        slime: Self::SourceAsset,
        _asset_id: AssetId<Self::SourceAsset>,
        render_device: &mut SystemParamItem<Self::Param>,
    ) -> Result<Self, PrepareAssetError<Self::SourceAsset>> {
        let buffer = render_device.create_buffer_with_data(&BufferInitDescriptor {
            label: Some("slime_buffer"),
            contents: bytemuck::bytes_of(&slime),
            usage: BufferUsages::STORAGE | BufferUsages::COPY_DST | BufferUsages::COPY_SRC,
        });

        Ok(GpuSlime { buffer })
    }
}

/// The slime the compute node operates on
#[derive(Resource, Clone, Debug, Deref, ExtractResource)]
pub struct SlimeHandle(pub Handle<Slime>);

/// Registers the slime asset, its loader and its GPU upload
pub struct SlimeAssetPlugin;

impl Plugin for SlimeAssetPlugin {
    fn build(&self, app: &mut App) {
        app.init_asset::<Slime>()
            .init_asset_loader::<SlimeLoader>()
            .add_plugins((
                RenderAssetPlugin::<GpuSlime>::default(),
                ExtractResourcePlugin::<SlimeHandle>::default(),
            ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::asset::LoadState;

    #[test]
    fn test_layout_matches_shader() {
        assert_eq!(Slime::min_size().get(), 16);
        assert_eq!(bytemuck::bytes_of(&Slime::default()).len(), 16);
    }

    #[test]
    fn test_with_value_zeroes_padding() {
        let slime = Slime::with_value(-1.0);
        assert_eq!(slime.value, -1.0);
        assert_eq!((slime._padding0, slime._padding1, slime._padding2), (0.0, 0.0, 0.0));
    }

    #[test]
    fn test_value_is_first_word() {
        let slime = Slime::with_value(2.5);
        let words: &[f32] = bytemuck::cast_slice(bytemuck::bytes_of(&slime));
        assert_eq!(words, &[2.5, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_parse_slime_file() {
        let slime = Slime::from_ron_bytes(b"(value: 3.0)").unwrap();
        assert_eq!(slime, Slime::with_value(3.0));
    }

    #[test]
    fn test_parse_empty_struct_defaults() {
        assert_eq!(Slime::from_ron_bytes(b"()").unwrap(), Slime::default());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            Slime::from_ron_bytes(b"(value: \"slimy\")"),
            Err(SlimeLoaderError::Ron(_))
        ));
    }

    #[test]
    fn test_loader_extension() {
        assert_eq!(SlimeLoader.extensions(), &["slime"]);
    }

    #[test]
    fn test_load_slime_asset_from_disk() {
        let mut app = App::new();
        app.add_plugins((MinimalPlugins, AssetPlugin::default(), SlimeAssetPlugin));

        let handle: Handle<Slime> = app
            .world()
            .resource::<AssetServer>()
            .load("slimes/initial.slime");

        for _ in 0..1000 {
            app.update();
            let state = app.world().resource::<AssetServer>().load_state(&handle);
            if matches!(state, LoadState::Loaded | LoadState::Failed(_)) {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(1));
        }

        let slimes = app.world().resource::<Assets<Slime>>();
        assert_eq!(slimes.get(&handle), Some(&Slime::default()));
    }
}
