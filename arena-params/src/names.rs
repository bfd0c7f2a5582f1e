//! Canonical parameter names, matching the keys of the persisted settings
//! document.

pub const CAMERA_SCALE: &str = "CAMERA_SCALE";
pub const CAMERA_BRIGHTNESS: &str = "CAMERA_BRIGHTNESS";
pub const CAMERA_CONTRAST: &str = "CAMERA_CONTRAST";
pub const CAMERA_SATURATION: &str = "CAMERA_SATURATION";
pub const CAMERA_AUTO_EXPOSURE: &str = "CAMERA_AUTO_EXPOSURE";
pub const CAMERA_EXPOSURE: &str = "CAMERA_EXPOSURE";
pub const CAMERA_ISO_SPEED: &str = "CAMERA_ISO_SPEED";

pub const BLUR_SIZE: &str = "BLUR_SIZE";
pub const THRESH_MIN: &str = "THRESH_MIN";
pub const CANNY_MIN: &str = "CANNY_MIN";
pub const CANNY_MAX: &str = "CANNY_MAX";
pub const AFTER_CANNY_THRESH_MIN: &str = "AFTER_CANNY_THRESH_MIN";

pub const MIN_BOT_AREA: &str = "MIN_BOT_AREA";
pub const MAX_BOT_AREA: &str = "MAX_BOT_AREA";
pub const MIN_BOT_ASPECT_RATIO: &str = "MIN_BOT_ASPECT_RATIO";
pub const MAX_BOT_ASPECT_RATIO: &str = "MAX_BOT_ASPECT_RATIO";

pub const MIN_DOT_R: &str = "MIN_DOT_R";
pub const MAX_DOT_R: &str = "MAX_DOT_R";
pub const MIN_DIRECTOR_R: &str = "MIN_DIRECTOR_R";
pub const MAX_DIRECTOR_R: &str = "MAX_DIRECTOR_R";

pub const FRAME_WIDTH: &str = "FRAME_WIDTH";
pub const FRAME_HEIGHT: &str = "FRAME_HEIGHT";
pub const POLYDP_EPSILON: &str = "POLYDP_EPSILON";
pub const ARENA_MASK_SCALE: &str = "ARENA_MASK_SCALE";
pub const ARENA_MASK_SIZE: &str = "ARENA_MASK_SIZE";
pub const SCALE_RECT_SIZE: &str = "SCALE_RECT_SIZE";
