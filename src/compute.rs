use bevy::prelude::*;
use bevy::render::render_asset::RenderAssets;
use bevy::render::render_graph::{self, RenderGraph, RenderLabel};
use bevy::render::render_resource::*;
use bevy::render::renderer::{RenderContext, RenderDevice};
use bevy::render::{Render, RenderApp, RenderSet};

use crate::slime::{GpuSlime, Slime, SlimeHandle};

const SHADER_ASSET_PATH: &str = "shaders/simple.wgsl";
const ENTRY_POINT: &str = "update";

/// Label for the slime compute node
#[derive(Debug, Hash, PartialEq, Eq, Clone, RenderLabel)]
pub struct SlimeComputeLabel;

/// Plugin that increments the active slime on the GPU once per frame
pub struct SlimeComputePlugin;

impl Plugin for SlimeComputePlugin {
    fn build(&self, app: &mut App) {
        let Some(render_app) = app.get_sub_app_mut(RenderApp) else {
            return;
        };

        render_app.add_systems(
            Render,
            prepare_bind_group.in_set(RenderSet::PrepareBindGroups),
        );

        // Runs before the camera driver so the value is updated ahead of any frame rendering
        let mut render_graph = render_app.world_mut().resource_mut::<RenderGraph>();
        render_graph.add_node(SlimeComputeLabel, SlimeNode::default());
        render_graph.add_node_edge(SlimeComputeLabel, bevy::render::graph::CameraDriverLabel);
    }

    fn finish(&self, app: &mut App) {
        // Pipeline creation needs the RenderDevice, which only exists once rendering is set up
        let Some(render_app) = app.get_sub_app_mut(RenderApp) else {
            return;
        };
        render_app.init_resource::<SlimePipeline>();

        info!("Slime compute plugin initialized");
    }
}

/// Bind group layout and queued compute pipeline for `shaders/simple.wgsl`
#[derive(Resource)]
pub struct SlimePipeline {
    bind_group_layout: BindGroupLayout,
    update_pipeline: CachedComputePipelineId,
}

impl FromWorld for SlimePipeline {
    fn from_world(world: &mut World) -> Self {
        let render_device = world.resource::<RenderDevice>();

        let bind_group_layout = render_device.create_bind_group_layout(
            "slime_bind_group_layout",
            &BindGroupLayoutEntries::single(ShaderStages::COMPUTE, storage_buffer_entry::<Slime>()),
        );

        let shader = world.resource::<AssetServer>().load(SHADER_ASSET_PATH);
        let pipeline_cache = world.resource::<PipelineCache>();

        let update_pipeline = pipeline_cache.queue_compute_pipeline(ComputePipelineDescriptor {
            label: Some("slime_update_pipeline".into()),
            layout: vec![bind_group_layout.clone()],
            push_constant_ranges: vec![],
            shader,
            shader_defs: vec![],
            entry_point: ENTRY_POINT.into(),
            zero_initialize_workgroup_memory: false,
        });

        SlimePipeline {
            bind_group_layout,
            update_pipeline,
        }
    }
}

/// Bind group over the active slime's storage buffer
#[derive(Resource)]
pub struct SlimeBindGroup(pub BindGroup);

fn prepare_bind_group(
    mut commands: Commands,
    pipeline: Res<SlimePipeline>,
    render_device: Res<RenderDevice>,
    gpu_slimes: Res<RenderAssets<GpuSlime>>,
    slime: Option<Res<SlimeHandle>>,
) {
    let Some(gpu_slime) = slime.and_then(|slime| gpu_slimes.get(&slime.0)) else {
        // Nothing to bind until the slime has been uploaded
        commands.remove_resource::<SlimeBindGroup>();
        return;
    };

    let bind_group = render_device.create_bind_group(
        "slime_bind_group",
        &pipeline.bind_group_layout,
        &BindGroupEntries::single(gpu_slime.buffer.as_entire_binding()),
    );
    commands.insert_resource(SlimeBindGroup(bind_group));
}

/// Lifecycle of the compute node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlimeState {
    /// Waiting for the pipeline to compile
    #[default]
    Loading,
    /// Dispatching every frame
    Update,
    /// The pipeline failed to compile; never dispatches
    Failed,
}

impl SlimeState {
    /// Next state given the current pipeline compilation status.
    ///
    /// A shader or import that has not finished loading is re-queued by the pipeline cache,
    /// so those errors keep the node waiting.
    pub fn advance(self, pipeline_state: &CachedPipelineState) -> Self {
        match (self, pipeline_state) {
            (SlimeState::Loading, CachedPipelineState::Ok(_)) => SlimeState::Update,
            (
                SlimeState::Loading,
                CachedPipelineState::Err(
                    PipelineCacheError::ShaderNotLoaded(_)
                    | PipelineCacheError::ShaderImportNotYetAvailable,
                ),
            ) => SlimeState::Loading,
            (SlimeState::Loading, CachedPipelineState::Err(_)) => SlimeState::Failed,
            (state, _) => state,
        }
    }
}

#[derive(Default)]
pub struct SlimeNode {
    state: SlimeState,
}

impl render_graph::Node for SlimeNode {
    fn update(&mut self, world: &mut World) {
        let Some(pipeline) = world.get_resource::<SlimePipeline>() else {
            return;
        };
        let pipeline_cache = world.resource::<PipelineCache>();
        let pipeline_state = pipeline_cache.get_compute_pipeline_state(pipeline.update_pipeline);

        let next = self.state.advance(pipeline_state);
        if next != self.state {
            match next {
                SlimeState::Update => info!("Slime pipeline ready, dispatching"),
                SlimeState::Failed => {
                    if let CachedPipelineState::Err(err) = pipeline_state {
                        error!("Slime pipeline failed to compile: {err}");
                    }
                }
                SlimeState::Loading => {}
            }
            self.state = next;
        }
    }

    fn run(
        &self,
        _graph: &mut render_graph::RenderGraphContext,
        render_context: &mut RenderContext,
        world: &World,
    ) -> Result<(), render_graph::NodeRunError> {
        if self.state != SlimeState::Update {
            return Ok(());
        }

        let Some(SlimeBindGroup(bind_group)) = world.get_resource::<SlimeBindGroup>() else {
            return Ok(());
        };
        let pipeline = world.resource::<SlimePipeline>();
        let pipeline_cache = world.resource::<PipelineCache>();
        let Some(update_pipeline) = pipeline_cache.get_compute_pipeline(pipeline.update_pipeline)
        else {
            return Ok(());
        };

        let mut pass = render_context
            .command_encoder()
            .begin_compute_pass(&ComputePassDescriptor {
                label: Some("slime_compute_pass"),
                timestamp_writes: None,
            });

        pass.set_pipeline(update_pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.dispatch_workgroups(1, 1, 1);

        Ok(())
    }
}

// Read-write storage buffer sized for `T`; sequential layouts assign the binding
fn storage_buffer_entry<T: ShaderType>() -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding: u32::MAX,
        visibility: ShaderStages::COMPUTE,
        ty: BindingType::Buffer {
            ty: BufferBindingType::Storage { read_only: false },
            has_dynamic_offset: false,
            min_binding_size: Some(T::min_size()),
        },
        count: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::render::render_graph::Node;

    #[test]
    fn test_stays_loading_while_queued() {
        assert_eq!(
            SlimeState::Loading.advance(&CachedPipelineState::Queued),
            SlimeState::Loading
        );
    }

    #[test]
    fn test_compile_error_fails() {
        let err = CachedPipelineState::Err(PipelineCacheError::CreateShaderModule(
            "invalid wgsl".to_string(),
        ));
        assert_eq!(SlimeState::Loading.advance(&err), SlimeState::Failed);
    }

    #[test]
    fn test_waits_for_shader_to_load() {
        let not_loaded =
            CachedPipelineState::Err(PipelineCacheError::ShaderNotLoaded(AssetId::default()));
        let state = SlimeState::Loading.advance(&not_loaded);
        assert_eq!(state, SlimeState::Loading);
        assert_eq!(state.advance(&CachedPipelineState::Queued), SlimeState::Loading);
    }

    #[test]
    fn test_waits_for_shader_imports() {
        let import_pending =
            CachedPipelineState::Err(PipelineCacheError::ShaderImportNotYetAvailable);
        assert_eq!(SlimeState::Loading.advance(&import_pending), SlimeState::Loading);
    }

    #[test]
    fn test_node_update_without_pipeline_keeps_loading() {
        let mut world = World::new();
        let mut node = SlimeNode::default();
        node.update(&mut world);
        node.update(&mut world);
        assert_eq!(node.state, SlimeState::Loading);
    }

    #[test]
    fn test_update_and_failed_are_terminal() {
        assert_eq!(
            SlimeState::Update.advance(&CachedPipelineState::Queued),
            SlimeState::Update
        );
        assert_eq!(
            SlimeState::Failed.advance(&CachedPipelineState::Queued),
            SlimeState::Failed
        );
    }

    #[test]
    fn test_node_starts_loading() {
        assert_eq!(SlimeNode::default().state, SlimeState::Loading);
    }

    #[test]
    fn test_storage_entry_fits_slime() {
        let entry = storage_buffer_entry::<Slime>();
        assert_eq!(entry.visibility, ShaderStages::COMPUTE);
        match entry.ty {
            BindingType::Buffer {
                ty: BufferBindingType::Storage { read_only },
                min_binding_size,
                ..
            } => {
                assert!(!read_only);
                assert_eq!(min_binding_size.map(|size| size.get()), Some(16));
            }
            other => panic!("unexpected binding type {other:?}"),
        }
    }

    #[test]
    fn test_plugin_without_render_app_is_inert() {
        let mut app = App::new();
        app.add_plugins((MinimalPlugins, SlimeComputePlugin));
        app.update();
        assert!(app.get_sub_app(RenderApp).is_none());
    }
}
