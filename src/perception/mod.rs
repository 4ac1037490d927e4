pub mod completeness;
pub mod cropper;
pub mod extractor;
pub mod overlay;
pub mod person;
pub mod yolo_person;
