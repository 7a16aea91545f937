//! Synthetic DICOM headers for tests and benchmarks.

use dicom::core::{DataElement, PrimitiveValue, VR};
use dicom::dictionary_std::tags;
use dicom::object::{FileMetaTableBuilder, InMemDicomObject};
use std::path::Path;

const CT_IMAGE_STORAGE: &str = "1.2.840.10008.5.1.4.1.1.2";
const EXPLICIT_VR_LITTLE_ENDIAN: &str = "1.2.840.10008.1.2.1";

/// Write a minimal CT header with the given Instance Number and Slice Location.
pub fn write_dicom<P: AsRef<Path>>(
    path: P,
    instance_number: Option<i32>,
    slice_location: Option<f64>,
) {
    let sop_instance_uid = format!("1.2.826.0.1.3680043.8.498.{}", rand::random::<u32>());

    let mut obj = InMemDicomObject::new_empty();
    obj.put(DataElement::new(
        tags::SOP_CLASS_UID,
        VR::UI,
        PrimitiveValue::from(CT_IMAGE_STORAGE),
    ));
    obj.put(DataElement::new(
        tags::SOP_INSTANCE_UID,
        VR::UI,
        PrimitiveValue::from(sop_instance_uid.as_str()),
    ));
    if let Some(instance_number) = instance_number {
        obj.put(DataElement::new(
            tags::INSTANCE_NUMBER,
            VR::IS,
            PrimitiveValue::from(instance_number.to_string()),
        ));
    }
    if let Some(slice_location) = slice_location {
        obj.put(DataElement::new(
            tags::SLICE_LOCATION,
            VR::DS,
            PrimitiveValue::from(slice_location.to_string()),
        ));
    }

    let file = obj
        .with_meta(
            FileMetaTableBuilder::new()
                .transfer_syntax(EXPLICIT_VR_LITTLE_ENDIAN)
                .media_storage_sop_class_uid(CT_IMAGE_STORAGE)
                .media_storage_sop_instance_uid(sop_instance_uid.as_str()),
        )
        .unwrap();
    file.write_to_file(path).unwrap();
}

/// Populate `dir` with one file per instance number, named by position.
pub fn write_series<P: AsRef<Path>>(dir: P, instance_numbers: &[i32]) {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir).unwrap();
    for (i, n) in instance_numbers.iter().enumerate() {
        write_dicom(dir.join(format!("IM{:04}.dcm", i)), Some(*n), None);
    }
}
