//! # Object Picking System
//!
//! Color-encoded GPU picking. Every pickable object is drawn into an offscreen
//! target in its own flat picking color; reading back the pixel under the
//! pointer then identifies the front-most object, since depth testing already
//! resolved occlusion.
//!
//! ## How it works
//!
//! 1. **Assign**: give each object a unique color ([`Picker::assign_picking_colors`])
//! 2. **Render**: between [`Picker::begin_offscreen`] and [`Picker::end_offscreen`],
//!    draw the scene with a shader that outputs the picking color
//! 3. **Find**: [`Picker::find`] reads the pixel and toggles the matching object
//!    in the picked list
//! 4. **Stop**: [`Picker::stop`] hands the picked list to `process_hits` and clears it
//!
//! Call [`Picker::update`] whenever the canvas resizes.

use std::ops::ControlFlow;

use crate::{
    engine::Engine,
    error::GpuError,
    gfx::{
        backend::RenderTargetId,
        scene::{DrawableObject, ObjectId, Scene},
    },
};

/// Distance between neighbouring channel values handed out by
/// [`Picker::assign_picking_colors`]; larger than twice the match tolerance
const CHANNEL_STEP: u32 = 3;
const CHANNEL_LEVELS: u32 = 255 / CHANNEL_STEP + 1;

/// Largest per-channel difference, in 0..=255 units, still treated as a match
const TOLERANCE: i32 = 1;

/// Color the offscreen target is cleared to; never assigned to an object
const BACKGROUND: [f32; 4] = [0.0, 0.0, 0.0, 0.0];

pub type HitPropertyFn = Box<dyn Fn(&DrawableObject) -> Option<[f32; 4]>>;
pub type HitFn = Box<dyn FnMut(&DrawableObject)>;
pub type ProcessHitsFn = Box<dyn FnMut(&[&DrawableObject])>;

/// Hooks invoked while picking
///
/// All are optional. Without `hit_property` the object's `picking_color` is used.
#[derive(Default)]
pub struct PickerCallbacks {
    /// Color an object is compared against; `None` makes it unpickable
    pub hit_property: Option<HitPropertyFn>,
    /// Called when an object enters the picked list
    pub add_hit: Option<HitFn>,
    /// Called when an object leaves the picked list through a second hit
    pub remove_hit: Option<HitFn>,
    /// Called by [`Picker::stop`] with the picked list, if it is non-empty
    pub process_hits: Option<ProcessHitsFn>,
}

impl PickerCallbacks {
    pub fn with_hit_property(
        mut self,
        callback: impl Fn(&DrawableObject) -> Option<[f32; 4]> + 'static,
    ) -> Self {
        self.hit_property = Some(Box::new(callback));
        self
    }

    pub fn with_add_hit(mut self, callback: impl FnMut(&DrawableObject) + 'static) -> Self {
        self.add_hit = Some(Box::new(callback));
        self
    }

    pub fn with_remove_hit(mut self, callback: impl FnMut(&DrawableObject) + 'static) -> Self {
        self.remove_hit = Some(Box::new(callback));
        self
    }

    pub fn with_process_hits(
        mut self,
        callback: impl FnMut(&[&DrawableObject]) + 'static,
    ) -> Self {
        self.process_hits = Some(Box::new(callback));
        self
    }
}

impl std::fmt::Debug for PickerCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PickerCallbacks")
            .field("hit_property", &self.hit_property.is_some())
            .field("add_hit", &self.add_hit.is_some())
            .field("remove_hit", &self.remove_hit.is_some())
            .field("process_hits", &self.process_hits.is_some())
            .finish()
    }
}

/// GPU color picker over the objects of a [`Scene`]
///
/// Hits are kept as [`ObjectId`]s, so a picker should stay with one scene.
pub struct Picker {
    engine: Engine,
    target: RenderTargetId,
    callbacks: PickerCallbacks,
    picked: Vec<ObjectId>,
}

impl Picker {
    /// Allocates an offscreen color + depth target the size of the canvas
    pub fn new(engine: &Engine, callbacks: PickerCallbacks) -> Self {
        let (width, height) = engine.canvas_size();
        let target = engine.backend().create_render_target(width, height);
        Self {
            engine: engine.clone(),
            target,
            callbacks,
            picked: Vec::new(),
        }
    }

    pub fn target(&self) -> RenderTargetId {
        self.target
    }

    /// Ids of the picked objects, in the order they were picked
    pub fn hits(&self) -> &[ObjectId] {
        &self.picked
    }

    /// Resizes the offscreen target to the current canvas size
    pub fn update(&mut self) {
        let (width, height) = self.engine.canvas_size();
        self.engine
            .backend()
            .resize_render_target(self.target, width, height);
    }

    /// Redirects drawing to the offscreen target and clears it
    pub fn begin_offscreen(&self) {
        let backend = self.engine.backend();
        backend.bind_render_target(Some(self.target));
        backend.clear(BACKGROUND);
    }

    /// Restores drawing to the canvas
    pub fn end_offscreen(&self) {
        self.engine.backend().bind_render_target(None);
    }

    /// Whether `readout` matches `color` within one unit per RGB channel
    pub fn compare(readout: [u8; 4], color: [f32; 4]) -> bool {
        readout.iter().zip(color).take(3).all(|(read, channel)| {
            let expected = (channel * 255.0).round() as i32;
            (expected - i32::from(*read)).abs() <= TOLERANCE
        })
    }

    fn hit_property(&self, object: &DrawableObject) -> Option<[f32; 4]> {
        match &self.callbacks.hit_property {
            Some(callback) => callback(object),
            None => object.picking_color,
        }
    }

    /// Reads the offscreen pixel at `coords` and toggles the first matching object
    ///
    /// `coords` are physical pixels with a top-left origin. Objects without a hit
    /// property are skipped. Returns whether an object was hit.
    ///
    /// # Errors
    /// Readback failures, including coordinates outside the target.
    pub fn find(&mut self, scene: &Scene, coords: (u32, u32)) -> Result<bool, GpuError> {
        let readout = self
            .engine
            .backend()
            .read_pixel(self.target, coords.0, coords.1)?;

        let hit = scene.traverse(|object, _| match self.hit_property(object) {
            Some(color) if Self::compare(readout, color) => ControlFlow::Break(object.id()),
            _ => ControlFlow::Continue(()),
        });
        let Some(object) = hit.and_then(|id| scene.get_by_id(id)) else {
            return Ok(false);
        };

        if let Some(index) = self.picked.iter().position(|id| *id == object.id()) {
            self.picked.remove(index);
            log::debug!("unpicked '{}'", object.alias);
            if let Some(callback) = &mut self.callbacks.remove_hit {
                callback(object);
            }
        } else {
            self.picked.push(object.id());
            log::debug!("picked '{}'", object.alias);
            if let Some(callback) = &mut self.callbacks.add_hit {
                callback(object);
            }
        }
        Ok(true)
    }

    /// Hands the picked objects to `process_hits`, then clears the picked list
    ///
    /// Picked objects no longer in `scene` are left out.
    pub fn stop(&mut self, scene: &Scene) {
        if !self.picked.is_empty() {
            if let Some(callback) = &mut self.callbacks.process_hits {
                let objects: Vec<&DrawableObject> = self
                    .picked
                    .iter()
                    .filter_map(|id| scene.get_by_id(*id))
                    .collect();
                callback(&objects);
            }
        }
        self.picked.clear();
    }

    /// Gives every object of `scene` a distinct opaque picking color
    ///
    /// Channels take multiples of 3, so no two colors fall within each other's
    /// tolerance, and black is left for the background. Returns the number of
    /// colored objects.
    pub fn assign_picking_colors(scene: &mut Scene) -> usize {
        let capacity = (CHANNEL_LEVELS.pow(3) - 1) as usize;
        let mut assigned = 0;
        scene.for_each_mut(|object, index| {
            if index >= capacity {
                object.picking_color = None;
                return;
            }
            let code = index as u32 + 1;
            let channel = |place: u32| {
                let level = (code / CHANNEL_LEVELS.pow(place)) % CHANNEL_LEVELS;
                (level * CHANNEL_STEP) as f32 / 255.0
            };
            object.picking_color = Some([channel(0), channel(1), channel(2), 1.0]);
            assigned += 1;
        });
        if assigned < scene.len() {
            log::warn!(
                "only {} of {} objects received a picking color",
                assigned,
                scene.len()
            );
        }
        assigned
    }
}

impl std::fmt::Debug for Picker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Picker")
            .field("target", &self.target)
            .field("callbacks", &self.callbacks)
            .field("picked", &self.picked)
            .finish()
    }
}

impl Drop for Picker {
    fn drop(&mut self) {
        self.engine.backend().delete_render_target(self.target);
    }
}
