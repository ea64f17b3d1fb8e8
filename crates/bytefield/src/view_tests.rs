use std::sync::Arc;

use crate::codec::Endianness;
use crate::error::ErrorKind;
use crate::field::Field;
use crate::instance::Struct;
use crate::layout::StructType;
use crate::value::{DenseArray, Value};

fn points_type() -> (Arc<StructType>, Arc<StructType>) {
    let point = StructType::builder("Point")
        .field("x", Field::i16().endian(Endianness::Little))
        .field("y", Field::i16().endian(Endianness::Little))
        .build()
        .unwrap();
    let ty = StructType::builder("Path")
        .field("count", Field::u8())
        .field("points", Field::dyn_array(Field::nested(&point)))
        .build()
        .unwrap();
    (point, ty)
}

#[test]
fn array_view_mut_writes_in_place() {
    let ty = StructType::builder("T")
        .field("grid", Field::array([2, 3], Field::u8()))
        .field("end", Field::u8())
        .build()
        .unwrap();
    let mut inst = Struct::new(&ty);

    let mut grid = inst.array_mut("grid").unwrap();
    assert_eq!(grid.shape(), [2, 3]);
    assert_eq!(grid.len(), 2);
    grid.set(&[0, 1], 5u8).unwrap();
    grid.set(&[-1, -1], 9u8).unwrap();
    assert_eq!(grid.get(&[1, 2]).unwrap(), Value::UInt(9));

    let err = grid.set(&[2, 0], 1u8).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Bounds);

    assert_eq!(inst.data(), [0, 5, 0, 0, 0, 9, 0]);
}

#[test]
fn element_writes_never_resize() {
    let ty = StructType::builder("T")
        .field("names", Field::array([2], Field::string(3)))
        .build()
        .unwrap();
    let mut inst = Struct::new(&ty);

    let mut names = inst.array_mut("names").unwrap();
    names.set(&[0], "abcdef").unwrap();
    names.set(&[1], "xy").unwrap();
    assert_eq!(inst.data(), b"abcxy\0");

    let err = inst.array_mut("names").unwrap().set(&[0], 3u8).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);
}

#[test]
fn dense_copy_is_detached() {
    let ty = StructType::builder("T")
        .field("arr", Field::dyn_array(Field::u32()))
        .build()
        .unwrap();
    let mut inst = Struct::new(&ty);
    inst.set("arr", Value::array([1u32, 2, 3])).unwrap();

    let dense = inst.array("arr").unwrap().to_dense().unwrap();
    inst.array_mut("arr").unwrap().set(&[0], 10u32).unwrap();

    assert_eq!(dense, [1u32, 2, 3].into_iter().collect::<DenseArray>());
    assert_eq!(inst.array("arr").unwrap().get(&[0]).unwrap(), Value::UInt(10));
}

#[test]
fn struct_elements() {
    let (point, ty) = points_type();
    let mut inst = Struct::new(&ty);
    inst.resize("points", 3usize, true).unwrap();
    assert_eq!(inst.data().len(), 1 + 3 * 4);

    {
        let mut points = inst.array_mut("points").unwrap();
        let mut p = points.nested_mut(&[1]).unwrap();
        p.set("x", -1i16).unwrap();
        p.set("y", 2i16).unwrap();
        assert_eq!(p.master_offset(), 5);

        let replacement = Struct::with_values(&point, [("x", 7i16), ("y", 8i16)]).unwrap();
        points.set(&[2], replacement).unwrap();
    }

    let points = inst.array("points").unwrap();
    assert_eq!(points.nested(&[1]).unwrap().get("x").unwrap(), Value::Int(-1));
    assert_eq!(points.nested(&[-1]).unwrap().get("y").unwrap(), Value::Int(8));

    let Value::Struct(second) = points.get(&[1]).unwrap() else {
        panic!("expected a struct value");
    };
    assert_eq!(second.get("y").unwrap(), Value::Int(2));
    assert_eq!(second.data(), [0xFF, 0xFF, 2, 0]);
}

#[test]
fn nested_on_scalar_elements_fails() {
    let ty = StructType::builder("T")
        .field("arr", Field::array([2], Field::u8()))
        .build()
        .unwrap();
    let inst = Struct::new(&ty);

    let err = inst.array("arr").unwrap().nested(&[0]).unwrap_err();
    insta::assert_snapshot!(err, @"expected a struct field, found u8");
}

#[test]
fn byte_range_views() {
    let ty = StructType::builder("T")
        .field("magic", Field::bytes(4))
        .field("body", Field::dyn_bytes())
        .build()
        .unwrap();
    let mut inst = Struct::new(&ty);
    inst.set("magic", b"\x7FELF").unwrap();
    inst.set("body", vec![1u8, 2, 3]).unwrap();

    let magic = inst.byte_range("magic").unwrap();
    assert_eq!(magic.len(), 4);
    assert_eq!(magic.get(0).unwrap(), 0x7F);
    assert_eq!(magic.get(-1).unwrap(), b'F');
    assert_eq!(magic.get(4).unwrap_err().kind(), ErrorKind::Bounds);

    let mut body = inst.byte_range_mut("body").unwrap();
    body.set(-1, 0xFF).unwrap();
    body.set(0, 0xAA).unwrap();
    assert_eq!(body.to_vec(), [0xAA, 2, 0xFF]);

    assert_eq!(inst.get("body").unwrap(), Value::Bytes(vec![0xAA, 2, 0xFF]));
}

#[test]
fn byte_range_extent_checked_up_front() {
    let ty = StructType::builder("T")
        .field("body", Field::dyn_bytes())
        .build()
        .unwrap();
    let mut inst = Struct::new(&ty);
    inst.resize("body", 5usize, false).unwrap();

    let err = inst.byte_range("body").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Bounds);
    assert!(inst.byte_range_mut("body").is_err());
}

#[test]
fn byte_range_only_for_bytes() {
    let ty = StructType::builder("T")
        .field("name", Field::string(2))
        .build()
        .unwrap();
    let inst = Struct::new(&ty);

    let err = inst.byte_range("name").unwrap_err();
    insta::assert_snapshot!(err, @"expected a bytes field, found str[2]");
}

#[test]
fn views_through_variable_fields() {
    let ty = StructType::builder("T")
        .field("var", Field::variable())
        .build()
        .unwrap();
    let mut inst = Struct::new(&ty);
    assert!(inst.array("var").is_err());

    inst.resize("var", Field::array([3], Field::u8()), true).unwrap();
    inst.array_mut("var").unwrap().set(&[2], 4u8).unwrap();
    assert_eq!(inst.data(), [0, 0, 4]);

    inst.resize("var", Field::bytes(3), false).unwrap();
    assert_eq!(inst.byte_range("var").unwrap().as_slice(), [0, 0, 4]);
}
