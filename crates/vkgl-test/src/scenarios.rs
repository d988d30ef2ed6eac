//! End-to-end behavior of the chain against the mocks.

use ash::vk;
use image::Rgba;
use vkgl_core::{Extent2D, HandleType, ImportDesc, Pattern, PixelFormat, ResourceState};
use vkgl_gl::GlTexture;
use vkgl_gpu::{
    allocate_device_memory, allocate_exportable_memory, bind, create_image, create_instance,
    create_logical_device, has_extension, list_device_extensions, select_physical_device,
    DeviceType, GpuContext, GpuContextBuilder, HandleExporter, ImageDesc, InstanceConfig,
    SelectionStrategy,
};
use vkgl_interop::{ErrorKind, InteropChain, InteropError};

use crate::harness::{compare_images, to_image, MockHarness};
use crate::mock::{queue_family, MockDeviceSpec, MockEvent, MockLoader, MockWorld};
use crate::TestError;

fn kind(error: impl Into<InteropError>) -> ErrorKind {
    error.into().kind()
}

fn build_context(world: &MockWorld, devices: Vec<MockDeviceSpec>) -> vkgl_gpu::Result<GpuContext> {
    GpuContextBuilder::new()
        .validation(false)
        .handle_type(HandleType::OpaqueFd)
        .build_with(&MockLoader::new(world, devices))
}

fn three_devices() -> Vec<MockDeviceSpec> {
    vec![
        MockDeviceSpec::graphics("Integrated A")
            .with_device_type(vk::PhysicalDeviceType::INTEGRATED_GPU),
        MockDeviceSpec::graphics("Discrete B"),
        MockDeviceSpec::graphics("Discrete C"),
    ]
}

#[test]
fn bound_allocation_covers_every_texel() {
    let h = MockHarness::new().unwrap();
    let device = &h.gpu.device;

    for extent in [
        Extent2D::new(1, 1),
        Extent2D::square(128),
        Extent2D::new(300, 17),
        Extent2D::new(16384, 1),
    ] {
        let image = create_image(device, &ImageDesc::exportable(extent, HandleType::OpaqueFd)).unwrap();
        let allocation = allocate_exportable_memory(device, &image, HandleType::OpaqueFd).unwrap();
        assert!(allocation.size() >= u64::from(extent.width) * u64::from(extent.height) * 4);

        let bound = bind(device, image, allocation).unwrap();
        assert!(bound.import_desc().unwrap().size_is_sufficient());
    }

    let live = h.world.live();
    assert_eq!((live.images, live.memories), (0, 0));
}

#[test]
fn extents_outside_device_limits_are_rejected() {
    let h = MockHarness::new().unwrap();
    for extent in [Extent2D::new(0, 16), Extent2D::new(16385, 1)] {
        let err = create_image(&h.gpu.device, &ImageDesc::exportable(extent, HandleType::OpaqueFd))
            .unwrap_err();
        assert_eq!(kind(err), ErrorKind::ResourceCreation);
    }
    assert_eq!(h.world.live().images, 0);
}

#[test]
fn oversized_pattern_chain_is_rejected_without_allocating() {
    let h = MockHarness::new().unwrap();
    // 64 GiB of pixels if the pattern were generated up front.
    let desc = h
        .chain_desc(Extent2D::square(1 << 17))
        .with_pattern(Pattern::Solid);

    let err = h.build_chain(&desc).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ResourceCreation);
    let live = h.world.live();
    assert_eq!((live.images, live.memories, live.blocks), (0, 0, 0));
    assert!(!h.world.events().contains(&MockEvent::Upload));
}

#[test]
fn binding_mismatched_declarations_fails_and_releases_both() {
    let h = MockHarness::new().unwrap();
    let device = &h.gpu.device;

    let image = create_image(device, &ImageDesc::exportable(Extent2D::square(8), HandleType::OpaqueFd)).unwrap();
    let allocation = allocate_device_memory(device, &image).unwrap();
    let err = bind(device, image, allocation).unwrap_err();

    assert_eq!(kind(err), ErrorKind::ExportImportMismatch);
    let live = h.world.live();
    assert_eq!((live.images, live.memories), (0, 0));
}

#[test]
fn exporting_undeclared_memory_is_a_mismatch() {
    let h = MockHarness::new().unwrap();
    let device = &h.gpu.device;

    let desc = ImageDesc {
        export_handle_type: None,
        ..ImageDesc::exportable(Extent2D::square(8), HandleType::OpaqueFd)
    };
    let image = create_image(device, &desc).unwrap();
    let allocation = allocate_device_memory(device, &image).unwrap();
    let bound = bind(device, image, allocation).unwrap();

    assert_eq!(
        kind(h.exporter.export_handle(&bound).unwrap_err()),
        ErrorKind::ExportImportMismatch
    );
    assert_eq!(kind(bound.import_desc().unwrap_err()), ErrorKind::ExportImportMismatch);
    assert!(!h.world.events().contains(&MockEvent::ExportHandle));
}

#[cfg(unix)]
#[test]
fn importer_rejects_an_allocation_too_small_for_the_image() {
    let h = MockHarness::new().unwrap();
    let device = &h.gpu.device;
    let extent = Extent2D::square(16);

    let image = create_image(device, &ImageDesc::exportable(extent, HandleType::OpaqueFd)).unwrap();
    let allocation = allocate_exportable_memory(device, &image, HandleType::OpaqueFd).unwrap();
    let bound = bind(device, image, allocation).unwrap();
    let handle = h.exporter.export_handle(&bound).unwrap();

    let short = ImportDesc {
        allocation_size: 16,
        ..bound.import_desc().unwrap()
    };
    let placeholder = h
        .importer
        .create_texture_placeholder(extent, PixelFormat::Rgba8Unorm)
        .unwrap();
    let err = h.importer.import(placeholder, handle, &short).unwrap_err();

    assert_eq!(kind(err), ErrorKind::ExportImportMismatch);
    let live = h.world.live();
    assert_eq!((live.textures, live.memory_objects), (0, 0));
}

#[cfg(unix)]
#[test]
fn filled_pixels_read_back_through_gl() {
    let h = MockHarness::new().unwrap();
    let extent = Extent2D::square(64);
    let mut chain = h
        .build_chain(&h.chain_desc(extent).with_pattern(Pattern::Checkerboard))
        .unwrap();

    assert_eq!(
        chain.read_back().unwrap(),
        Pattern::Checkerboard.generate(extent).unwrap()
    );

    let gradient = Pattern::Gradient.generate(extent).unwrap();
    chain.fill(&gradient).unwrap();
    let read = to_image(extent, chain.read_back().unwrap()).unwrap();
    let expected = to_image(extent, gradient).unwrap();
    assert_eq!(compare_images(&read, &expected).unwrap(), 0.0);
}

#[cfg(unix)]
#[test]
fn bgra_chain_samples_the_same_colours_as_rgba() {
    let h = MockHarness::new().unwrap();
    let extent = Extent2D::square(4);
    let rgba = h
        .build_chain(&h.chain_desc(extent).with_pattern(Pattern::Solid))
        .unwrap();
    let mut bgra = h
        .build_chain(
            &h.chain_desc(extent)
                .with_format(PixelFormat::Bgra8Unorm)
                .with_pattern(Pattern::Solid),
        )
        .unwrap();
    let sample = |chain: &InteropChain, x, y| {
        h.gl.sample(GlTexture(chain.texture_id().unwrap()), x, y).unwrap()
    };

    assert_eq!(sample(&rgba, 1, 2), [0xFF, 0, 0, 0xFF]);
    assert_eq!(sample(&bgra, 1, 2), [0xFF, 0, 0, 0xFF]);

    // Readback is in memory order, blue first.
    let stored = bgra.read_back().unwrap();
    assert_eq!(stored[..4], [0, 0, 0xFF, 0xFF]);
    assert_eq!(stored, PixelFormat::Bgra8Unorm.reorder_rgba8(rgba.read_back().unwrap()));

    bgra.fill_pattern(Pattern::Gradient).unwrap();
    let gradient = to_image(extent, Pattern::Gradient.generate(extent).unwrap()).unwrap();
    for (x, y, expected) in gradient.enumerate_pixels() {
        assert_eq!(Rgba(sample(&bgra, x, y)), *expected, "texel ({x}, {y})");
    }
}

#[cfg(unix)]
#[test]
fn unimported_handle_is_forgotten_once_closed() {
    let h = MockHarness::new().unwrap();
    let device = &h.gpu.device;

    let image = create_image(device, &ImageDesc::exportable(Extent2D::square(8), HandleType::OpaqueFd)).unwrap();
    let allocation = allocate_exportable_memory(device, &image, HandleType::OpaqueFd).unwrap();
    let bound = bind(device, image, allocation).unwrap();
    let handle = h.exporter.export_handle(&bound).unwrap();
    assert_eq!(h.world.live().exported_handles, 1);

    drop(handle);
    assert_eq!(h.world.live().exported_handles, 0);
    drop(bound);
    assert_eq!(h.world.live().blocks, 0);
}

#[cfg(unix)]
#[test]
fn checkerboard_cells_land_where_expected() {
    let h = MockHarness::new().unwrap();
    let extent = Extent2D::square(32);
    let chain = h
        .build_chain(&h.chain_desc(extent).with_pattern(Pattern::Checkerboard))
        .unwrap();

    let image = to_image(extent, chain.read_back().unwrap()).unwrap();
    assert_eq!(*image.get_pixel(0, 0), Rgba([0xFF, 0, 0, 0xFF]));
    assert_eq!(*image.get_pixel(16, 0), Rgba([0xFF; 4]));
    assert_eq!(*image.get_pixel(16, 16), Rgba([0xFF, 0, 0, 0xFF]));
}

#[test]
fn first_strategy_picks_device_zero() {
    let world = MockWorld::new();
    let loader = MockLoader::new(&world, three_devices());
    let instance = create_instance(&loader, &InstanceConfig::new().with_validation(false)).unwrap();

    for _ in 0..3 {
        let selected = select_physical_device(&instance, &SelectionStrategy::First).unwrap();
        assert_eq!((selected.index, selected.name.as_str()), (0, "Integrated A"));
    }

    let discrete =
        select_physical_device(&instance, &SelectionStrategy::PreferType(DeviceType::Discrete))
            .unwrap();
    assert_eq!(discrete.name, "Discrete B");

    let named =
        select_physical_device(&instance, &SelectionStrategy::NameContains("C".into())).unwrap();
    assert_eq!(named.index, 2);

    let err = select_physical_device(&instance, &SelectionStrategy::Index(3)).unwrap_err();
    assert_eq!(kind(err), ErrorKind::Initialization);
}

#[test]
fn compute_only_device_has_no_graphics_queue() {
    let world = MockWorld::new();
    let spec = MockDeviceSpec::graphics("Compute")
        .with_queue_families(vec![queue_family(vk::QueueFlags::COMPUTE, 2)]);
    let loader = MockLoader::new(&world, vec![spec]);
    let instance = create_instance(&loader, &InstanceConfig::new().with_validation(false)).unwrap();
    let physical = select_physical_device(&instance, &SelectionStrategy::First).unwrap();

    let err = create_logical_device(&instance, &physical, &[]).unwrap_err();
    assert_eq!(kind(err), ErrorKind::NoGraphicsQueue);
    assert_eq!(world.live().devices, 0);
}

#[test]
fn zero_queue_families_fail_cleanly() {
    let world = MockWorld::new();
    let spec = MockDeviceSpec::graphics("Empty").with_queue_families(Vec::new());

    let Err(err) = build_context(&world, vec![spec]) else {
        panic!("context creation should fail");
    };
    assert_eq!(kind(err), ErrorKind::NoGraphicsQueue);
    assert_eq!(world.live().total(), 0);
    assert_eq!(
        world.events(),
        vec![MockEvent::CreateInstance, MockEvent::DestroyInstance]
    );
}

#[cfg(unix)]
#[test]
fn end_to_end_128_square_chain() {
    let h = MockHarness::new().unwrap();
    let mut chain = h
        .build_chain(&h.chain_desc(Extent2D::square(128)).with_pattern(Pattern::Solid))
        .unwrap();

    assert!(chain.texture_id().is_some_and(|id| id != 0));
    assert_eq!(chain.state(), ResourceState::Imported);
    assert_eq!(h.world.dedicated_memory_objects(), 1);

    let desc = chain.import_desc().copied().unwrap();
    assert_eq!(desc.extent, Extent2D::square(128));
    assert!(desc.allocation_size >= 128 * 128 * 4);

    chain.mark_displayed().unwrap();
    chain.mark_displayed().unwrap();
    assert_eq!(chain.state(), ResourceState::Displayed);
    assert_eq!(h.world.live().exported_handles, 0);
}

#[cfg(unix)]
#[test]
fn teardown_runs_gl_first_then_vulkan_then_device() {
    let h = MockHarness::new().unwrap();
    let world = h.world.clone();
    let mut chain = h.build_chain(&h.chain_desc(Extent2D::square(32))).unwrap();
    world.clear_events();

    chain.destroy();
    assert_eq!(chain.state(), ResourceState::Destroyed);
    assert_eq!(
        world.teardown_events(),
        vec![
            MockEvent::DeleteTexture,
            MockEvent::DeleteMemoryObject,
            MockEvent::ReleaseHandle,
            MockEvent::DestroyImage,
            MockEvent::FreeMemory,
        ]
    );

    // A second destroy, and the drop that follows, release nothing more.
    chain.destroy();
    drop(chain);
    drop(h);
    assert_eq!(
        world.teardown_events()[5..],
        [MockEvent::DestroyDevice, MockEvent::DestroyInstance]
    );
    assert_eq!(world.live().total(), 0);
}

#[cfg(unix)]
#[test]
fn failed_gl_import_releases_everything_it_created() {
    let h = MockHarness::new().unwrap();
    h.gl.fail_imports(true);

    let err = h
        .build_chain(&h.chain_desc(Extent2D::square(16)).with_pattern(Pattern::Solid))
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ExportImportMismatch);
    let live = h.world.live();
    assert_eq!(live.images + live.memories + live.textures + live.memory_objects, 0);
    assert_eq!(live.blocks, 0);
    assert!(!h.world.events().contains(&MockEvent::ReleaseHandle));
}

#[test]
fn export_before_load_is_function_not_loaded() {
    let h = MockHarness::new().unwrap();
    let device = &h.gpu.device;
    let unloaded = HandleExporter::new(HandleType::OpaqueFd);
    assert!(!unloaded.is_loaded());

    let image = create_image(device, &ImageDesc::exportable(Extent2D::square(8), HandleType::OpaqueFd)).unwrap();
    let allocation = allocate_exportable_memory(device, &image, HandleType::OpaqueFd).unwrap();
    let bound = bind(device, image, allocation).unwrap();

    assert_eq!(
        kind(unloaded.export_handle(&bound).unwrap_err()),
        ErrorKind::FunctionNotLoaded
    );
}

#[test]
fn chain_with_unloaded_exporter_leaves_nothing_behind() {
    let h = MockHarness::new().unwrap();
    let unloaded = HandleExporter::new(HandleType::OpaqueFd);

    let err = vkgl_interop::InteropChain::build(
        &h.gpu.device,
        &unloaded,
        &h.importer,
        &h.chain_desc(Extent2D::square(8)),
    )
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::FunctionNotLoaded);
    let live = h.world.live();
    assert_eq!((live.images, live.memories, live.textures), (0, 0, 0));
}

#[test]
fn missing_export_entry_point_is_function_not_loaded() {
    let world = MockWorld::new();
    let spec = MockDeviceSpec::graphics("No export").without_export_entry_point();
    let Ok(gpu) = build_context(&world, vec![spec]) else {
        panic!("context creation should succeed");
    };

    let mut exporter = HandleExporter::new(HandleType::OpaqueFd);
    let err = exporter.load(&gpu.device).unwrap_err();
    assert_eq!(kind(err), ErrorKind::FunctionNotLoaded);
    assert!(!exporter.is_loaded());
}

#[test]
fn device_extensions_are_listed_sorted() {
    let world = MockWorld::new();
    let spec = MockDeviceSpec::graphics("Unsorted").with_extensions(&[
        "VK_KHR_swapchain",
        "VK_KHR_external_memory_fd",
        "VK_KHR_external_memory",
    ]);
    let loader = MockLoader::new(&world, vec![spec]);
    let instance = create_instance(&loader, &InstanceConfig::new().with_validation(false)).unwrap();
    let physical = select_physical_device(&instance, &SelectionStrategy::First).unwrap();

    assert_eq!(
        list_device_extensions(&instance, &physical).unwrap(),
        ["VK_KHR_external_memory", "VK_KHR_external_memory_fd", "VK_KHR_swapchain"]
    );
    assert!(has_extension(&physical, "VK_KHR_external_memory_fd"));
    assert!(!has_extension(&physical, "VK_KHR_external_memory_win32"));
}

#[test]
fn missing_validation_layer_is_initialization_error() {
    let world = MockWorld::new();
    let loader = MockLoader::single(&world).without_layers();

    let err = create_instance(&loader, &InstanceConfig::new().with_validation(true)).unwrap_err();
    assert_eq!(kind(err), ErrorKind::Initialization);
    assert_eq!(world.live().instances, 0);

    assert!(create_instance(&loader, &InstanceConfig::new().with_validation(false)).is_ok());
}

#[test]
fn device_without_export_extension_is_rejected() {
    let world = MockWorld::new();
    let spec = MockDeviceSpec::graphics("Plain").with_extensions(&["VK_KHR_swapchain"]);

    let Err(err) = build_context(&world, vec![spec]) else {
        panic!("context creation should fail");
    };
    assert_eq!(kind(err), ErrorKind::Initialization);
    assert_eq!(world.live().devices, 0);
}

#[test]
fn host_only_memory_has_no_suitable_type() {
    let world = MockWorld::new();
    let spec = MockDeviceSpec::graphics("Host only")
        .with_memory_types(vec![vk::MemoryPropertyFlags::HOST_VISIBLE]);
    let Ok(gpu) = build_context(&world, vec![spec]) else {
        panic!("context creation should succeed");
    };

    let image = create_image(
        &gpu.device,
        &ImageDesc::exportable(Extent2D::square(8), HandleType::OpaqueFd),
    )
    .unwrap();
    let err = allocate_exportable_memory(&gpu.device, &image, HandleType::OpaqueFd).unwrap_err();
    assert_eq!(kind(err), ErrorKind::NoSuitableMemoryType);
}

#[test]
fn harness_errors_surface_as_interop_errors() {
    let err = MockHarness::with_devices(Vec::new()).err().unwrap();
    assert!(matches!(err, TestError::Interop(ref e) if e.kind() == ErrorKind::Initialization));
}

#[test]
fn device_summary() {
    let world = MockWorld::new();
    let loader = MockLoader::single(&world);
    let instance = create_instance(&loader, &InstanceConfig::new().with_validation(false)).unwrap();
    let device = select_physical_device(&instance, &SelectionStrategy::First).unwrap();

    insta::assert_snapshot!(
        device.summary(),
        @"Mock GPU (Nvidia, Discrete) - Vulkan 1.3.0 - 3 extensions"
    );
}
