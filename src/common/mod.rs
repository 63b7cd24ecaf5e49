pub const VALID_IMAGE_EXTENSIONS: &'static [&'static str] = &[
    "jpg", "jpeg", "jfif", "jpe", "png", "tif", "tiff", "webp", "bmp", "gif",
];

/// Values of a string validity flag that count as true (compared lowercase)
pub const TRUE_LIKE_VALUES: &'static [&'static str] = &["true", "yes", "1", "t", "y"];

pub const DEFAULT_QUERY: &str = "Describe the content of this image and output the result as a \
markdown ```json code block.";

pub const DEFAULT_MIN_SIZE_KB: u64 = 30;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

pub const DEFAULT_RETRY_DELAY_SECS: u64 = 5;

pub const DEFAULT_MAX_DEPTH: usize = 5;

pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

pub const APP_BUILDER_ENDPOINT: &str = "https://qianfan.baidubce.com";

pub const CHAT_COMPLETION_ENDPOINT: &str = "https://ark.cn-beijing.volces.com/api/v3";
