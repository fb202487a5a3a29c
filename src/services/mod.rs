pub mod composer;
pub mod converter;
pub mod ffmpeg;
pub mod jobs;
pub mod workspace;
