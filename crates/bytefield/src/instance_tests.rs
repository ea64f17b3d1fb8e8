use std::sync::Arc;

use crate::codec::Endianness;
use crate::error::{Error, ErrorKind};
use crate::field::Field;
use crate::instance::Struct;
use crate::layout::StructType;
use crate::value::{DenseArray, Value};

fn grid_type() -> Arc<StructType> {
    let inner = StructType::builder("InnerStruct")
        .field("value1", Field::string(3))
        .field("value2", Field::string(3))
        .field("value3", Field::array([3], Field::f32()))
        .build()
        .unwrap();

    StructType::builder("TestStruct")
        .field("value1", Field::i32())
        .field("value2", Field::f64())
        .field("value3", Field::array([3, 3], Field::u16()))
        .field("inner", Field::nested(&inner))
        .field("ba", Field::bytes(10))
        .build()
        .unwrap()
}

#[test]
fn fixed_struct_values() {
    let ty = grid_type();
    assert_eq!(ty.min_size(), 4 + 8 + 3 * 3 * 2 + (3 + 3 + 3 * 4) + 10);

    let grid = DenseArray::new(vec![3, 3], (1u16..=9).map(Value::from).collect()).unwrap();
    let mut inst = Struct::with_values(
        &ty,
        [
            ("value1", Value::from(15i32)),
            ("value2", Value::from(90.2)),
            ("value3", Value::from(grid.clone())),
            ("ba", Value::from(vec![3u8; 10])),
        ],
    )
    .unwrap();

    assert_eq!(inst.get("value1").unwrap(), Value::Int(15));
    assert_eq!(inst.get("value2").unwrap(), Value::Float(90.2));
    assert_eq!(inst.array("value3").unwrap().to_dense().unwrap(), grid);
    assert_eq!(inst.byte_range("ba").unwrap().to_vec(), vec![3u8; 10]);

    let mut inner = inst.nested_mut("inner").unwrap();
    inner.set("value1", "abc").unwrap();
    inner.set("value2", "def").unwrap();
    inner.set("value3", Value::array([3.0f32, 2.0, 1.0])).unwrap();

    let inner = inst.nested("inner").unwrap();
    assert_eq!(inner.get("value1").unwrap(), Value::Str("abc".into()));
    assert_eq!(inner.get("value2").unwrap(), Value::Str("def".into()));
    assert_eq!(
        inner.array("value3").unwrap().to_dense().unwrap(),
        [3.0f64, 2.0, 1.0].into_iter().collect::<DenseArray>()
    );
    assert_eq!(inner.master_offset(), 30);
}

#[test]
fn array_index_arithmetic() {
    let ty = grid_type();
    let mut inst = Struct::new(&ty);
    let grid = DenseArray::new(vec![3, 3], (1u16..=9).map(Value::from).collect()).unwrap();
    inst.set("value3", grid).unwrap();

    let arr = inst.array("value3").unwrap();
    assert_eq!(arr.get(&[1, 2]).unwrap(), Value::UInt(6));
    assert_eq!(arr.get(&[-1, -1]).unwrap(), Value::UInt(9));
    assert_eq!(arr.get(&[0, 0]).unwrap(), Value::UInt(1));

    let err = arr.get(&[3, 0]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Bounds);
    assert!(arr.get(&[1]).is_err());
}

#[test]
fn offset_chaining_uses_current_sizes() {
    let ty = StructType::builder("Chain")
        .field("a", Field::dyn_bytes())
        .field("b", Field::dyn_bytes())
        .field("c", Field::u8())
        .build()
        .unwrap();

    let mut inst = Struct::new(&ty);
    assert_eq!(inst.calc_field_offset("c").unwrap(), 0);

    inst.set("a", vec![1u8, 2, 3]).unwrap();
    inst.set("b", vec![4u8, 5, 6, 7, 8]).unwrap();
    inst.set("c", 9u8).unwrap();

    assert_eq!(inst.calc_field_offset("c").unwrap(), 8);
    assert_eq!(inst.data(), [1, 2, 3, 4, 5, 6, 7, 8, 9]);

    let fixed = StructType::builder("Chain")
        .field("a", Field::u32())
        .field("b", Field::u32())
        .field("c", Field::u8())
        .build()
        .unwrap();
    assert_eq!(Struct::new(&fixed).calc_field_offset("c").unwrap(), 8);
}

#[test]
fn master_offset_shifts_every_field() {
    let ty = StructType::builder("T")
        .field("a", Field::u8())
        .field("b", Field::u16().endian(Endianness::Big))
        .build()
        .unwrap();

    let inst = Struct::with_master_offset(&ty, vec![0xFF, 0xFF, 7, 0x01, 0x02], 2);
    assert_eq!(inst.calc_offset("b").unwrap(), 3);
    assert_eq!(inst.calc_field_offset("b").unwrap(), 1);
    assert_eq!(inst.get("a").unwrap(), Value::UInt(7));
    assert_eq!(inst.get("b").unwrap(), Value::UInt(0x0102));
    assert_eq!(AsRef::<[u8]>::as_ref(&inst), [7, 0x01, 0x02]);
}

#[test]
fn instances_do_not_share_state() {
    let inner = StructType::builder("InnerStruct")
        .field("inner_arr", Field::dyn_array(Field::string(3)))
        .build()
        .unwrap();
    let element = StructType::builder("ElementStruct")
        .field("elem", Field::i32())
        .build()
        .unwrap();
    let ty = StructType::builder("TestStruct")
        .field("static", Field::i32())
        .field("arr", Field::dyn_array(Field::i32()))
        .field("inner", Field::nested(&inner))
        .field("elements", Field::dyn_array(Field::nested(&element)))
        .build()
        .unwrap();

    let mut inst1 = Struct::new(&ty);
    let mut inst2 = Struct::new(&ty);
    let inst3 = Struct::new(&ty);

    inst1.set("arr", Value::array([1i32, 2, 3])).unwrap();
    inst2.set("arr", Value::array([4i32, 5, 6, 7])).unwrap();

    assert_eq!(
        inst1.array("arr").unwrap().to_dense().unwrap(),
        [1i32, 2, 3].into_iter().collect::<DenseArray>()
    );
    assert_eq!(
        inst2.array("arr").unwrap().to_dense().unwrap(),
        [4i32, 5, 6, 7].into_iter().collect::<DenseArray>()
    );
    assert_eq!(inst3.array("arr").unwrap().shape(), [0]);
    assert_ne!(inst1.data().len(), inst2.data().len());

    inst1
        .nested_mut("inner")
        .unwrap()
        .set("inner_arr", Value::array(["000", "111", "222"]))
        .unwrap();
    inst2
        .nested_mut("inner")
        .unwrap()
        .set("inner_arr", Value::array(["222", "333", "444", "555"]))
        .unwrap();

    let elements = [5i32, 1].map(|v| Struct::with_values(&element, [("elem", v)]).unwrap());
    inst1.set("elements", Value::array(elements)).unwrap();
    inst2.resize("elements", 4usize, true).unwrap();

    assert_eq!(
        inst1.nested("inner").unwrap().array("inner_arr").unwrap().to_dense().unwrap(),
        ["000", "111", "222"].into_iter().collect::<DenseArray>()
    );
    let elements = inst1.array("elements").unwrap();
    assert_eq!(elements.nested(&[0]).unwrap().get("elem").unwrap(), Value::Int(5));
    assert_eq!(elements.nested(&[1]).unwrap().get("elem").unwrap(), Value::Int(1));

    assert_eq!(
        inst2.nested("inner").unwrap().array("inner_arr").unwrap().to_dense().unwrap(),
        ["222", "333", "444", "555"].into_iter().collect::<DenseArray>()
    );
    let elements = inst2.array("elements").unwrap();
    assert_eq!(elements.len(), 4);
    assert_eq!(elements.nested(&[3]).unwrap().get("elem").unwrap(), Value::Int(0));
}

#[test]
fn resize_moves_trailing_data() {
    let ty = StructType::builder("T")
        .field("blob", Field::dyn_bytes())
        .field("tail", Field::u16().endian(Endianness::Little))
        .build()
        .unwrap();

    let mut inst = Struct::new(&ty);
    inst.resize("blob", 4usize, true).unwrap();
    inst.set("blob", vec![1u8, 2, 3, 4]).unwrap();
    inst.set("tail", 0xBEEFu16).unwrap();
    assert_eq!(inst.data(), [1, 2, 3, 4, 0xEF, 0xBE]);

    inst.resize("blob", 8usize, true).unwrap();
    assert_eq!(inst.calc_offset("tail").unwrap(), 8);
    assert_eq!(inst.get("tail").unwrap(), Value::UInt(0xBEEF));
    assert_eq!(inst.get("blob").unwrap(), Value::Bytes(vec![1, 2, 3, 4, 0, 0, 0, 0]));
    assert_eq!(inst.data().len(), 10);

    inst.resize("blob", 2usize, true).unwrap();
    assert_eq!(inst.data(), [1, 2, 0xEF, 0xBE]);
    assert_eq!(inst.get("tail").unwrap(), Value::UInt(0xBEEF));
}

#[test]
fn logical_resize_and_overflow() {
    let ty = StructType::builder("T")
        .field("len", Field::u8())
        .field("payload", Field::dyn_bytes())
        .build()
        .unwrap();

    let mut inst = Struct::from_bytes(&ty, vec![3u8, 0xAA]);
    assert!(inst.check_overflow().is_ok());

    inst.resize("payload", 3usize, false).unwrap();
    assert_eq!(inst.size(), 4);

    let err = inst.check_overflow().unwrap_err();
    assert_eq!(err, Error::Overflow { required: 4, len: 2 });
    assert_eq!(err.kind(), ErrorKind::Overflow);

    assert_eq!(inst.get("len").unwrap(), Value::UInt(3));
    assert_eq!(inst.get("payload").unwrap_err().kind(), ErrorKind::Bounds);
}

#[test]
fn overlapping_fields_overflow_past_last_declared() {
    let ty = StructType::builder("Union")
        .field("tag", Field::u8())
        .field("as_int", Field::u32().after("tag"))
        .field("as_blob", Field::dyn_bytes().after("tag"))
        .build()
        .unwrap();

    let mut inst = Struct::new(&ty);
    assert_eq!(inst.data().len(), 5);
    assert_eq!(ty.last_field(), ty.field_id("as_blob"));
    assert!(inst.check_overflow().is_ok());

    inst.resize("as_blob", 20usize, false).unwrap();
    assert_eq!(inst.size(), 21);
    let err = inst.check_overflow().unwrap_err();
    assert_eq!(err, Error::Overflow { required: 21, len: 5 });
}

#[test]
fn failed_array_write_leaves_field_untouched() {
    let ty = StructType::builder("T")
        .field("arr", Field::dyn_array(Field::u8()))
        .field("tail", Field::u8())
        .build()
        .unwrap();

    let mut inst = Struct::new(&ty);
    inst.set("tail", 9u8).unwrap();

    let err = inst.set("arr", Value::array([1u16, 2, 300])).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);
    assert_eq!(inst.array("arr").unwrap().shape(), [0]);
    assert_eq!(inst.data(), [9]);
    assert_eq!(inst.get("tail").unwrap(), Value::UInt(9));

    inst.set("arr", Value::array([1u8, 2])).unwrap();
    let err = inst.set("arr", Value::array([7u16, 256])).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);
    assert_eq!(inst.data(), [1, 2, 9]);
    assert_eq!(inst.get("arr").unwrap(), Value::array([1u8, 2]));
}

#[test]
fn failed_fixed_array_write_keeps_old_elements() {
    let ty = StructType::builder("T")
        .field("grid", Field::array([3], Field::u8()))
        .build()
        .unwrap();

    let mut inst = Struct::from_bytes(&ty, vec![4u8, 5, 6]);
    let err = inst.set("grid", Value::array([1u16, 2, 300])).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);
    assert_eq!(inst.data(), [4, 5, 6]);
}

#[test]
fn resize_out_of_buffer_leaves_state_alone() {
    let ty = StructType::builder("T")
        .field("payload", Field::dyn_bytes())
        .build()
        .unwrap();

    let mut inst = Struct::new(&ty);
    inst.resize("payload", 4usize, false).unwrap();
    let err = inst.resize("payload", 8usize, true).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Bounds);
    assert_eq!(inst.field_size("payload").unwrap(), 4);
    assert!(inst.data().is_empty());
}

#[test]
fn resize_rejects_static_and_mismatched_fields() {
    let ty = StructType::builder("T")
        .field("count", Field::u32())
        .field("name", Field::dyn_string())
        .build()
        .unwrap();
    let mut inst = Struct::new(&ty);

    let err = inst.resize("count", 8usize, true).unwrap_err();
    insta::assert_snapshot!(err, @"field `count` is not dynamic and cannot be resized");

    let err = inst.resize("name", Field::u8(), true).unwrap_err();
    insta::assert_snapshot!(err, @"str[*] field cannot be resized to a type");

    let err = inst.get("missing").unwrap_err();
    assert_eq!(err, Error::UnknownField("missing".into()));

    let err = inst.resize("missing", 1usize, true).unwrap_err();
    assert_eq!(err, Error::UnknownField("missing".into()));
    assert_eq!(inst.data().len(), 4);
}

#[test]
fn nested_follows_parent_resize() {
    let inner = StructType::builder("Inner")
        .field("x", Field::u16().endian(Endianness::Little))
        .build()
        .unwrap();
    let outer = StructType::builder("Outer")
        .field("prefix", Field::dyn_bytes())
        .field("inner", Field::nested(&inner))
        .build()
        .unwrap();

    let mut inst = Struct::new(&outer);
    inst.nested_mut("inner").unwrap().set("x", 0x1234u16).unwrap();
    assert_eq!(inst.nested("inner").unwrap().master_offset(), 0);

    inst.resize("prefix", 3usize, true).unwrap();

    let nested = inst.nested("inner").unwrap();
    assert_eq!(nested.master_offset(), 3);
    assert_eq!(nested.get("x").unwrap(), Value::UInt(0x1234));
    assert_eq!(inst.data(), [0, 0, 0, 0x34, 0x12]);
}

#[test]
fn nested_resize_splices_parent_buffer() {
    let inner = StructType::builder("Inner")
        .field("name", Field::dyn_string())
        .field("id", Field::u8())
        .build()
        .unwrap();
    let outer = StructType::builder("Outer")
        .field("inner", Field::nested(&inner))
        .field("crc", Field::u8())
        .build()
        .unwrap();

    let mut inst = Struct::new(&outer);
    inst.set("crc", 0xCCu8).unwrap();
    {
        let mut nested = inst.nested_mut("inner").unwrap();
        nested.set("name", "hey").unwrap();
        nested.set("id", 1u8).unwrap();
    }

    assert_eq!(inst.data(), b"hey\x01\xCC");
    assert_eq!(inst.size(), 5);
    assert_eq!(inst.get("crc").unwrap(), Value::UInt(0xCC));
}

#[test]
fn set_nested_struct_copies_bytes_and_state() {
    let inner = StructType::builder("Inner")
        .field("name", Field::dyn_string())
        .build()
        .unwrap();
    let outer = StructType::builder("Outer")
        .field("inner", Field::nested(&inner))
        .field("end", Field::u8())
        .build()
        .unwrap();

    let src = Struct::with_values(&inner, [("name", "abcd")]).unwrap();
    let mut inst = Struct::new(&outer);
    inst.set("end", 7u8).unwrap();
    inst.set("inner", src.clone()).unwrap();

    assert_eq!(inst.data(), b"abcd\x07");
    assert_eq!(inst.get("inner").unwrap(), Value::Struct(src));
    assert_eq!(
        inst.nested("inner").unwrap().get("name").unwrap(),
        Value::Str("abcd".into())
    );

    let other = StructType::builder("Inner")
        .field("name", Field::dyn_string())
        .build()
        .unwrap();
    let err = inst.set("inner", Struct::new(&other)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);
}

#[test]
fn get_nested_struct_is_detached() {
    let inner = StructType::builder("Inner")
        .field("x", Field::u8())
        .build()
        .unwrap();
    let outer = StructType::builder("Outer")
        .field("inner", Field::nested(&inner))
        .build()
        .unwrap();

    let mut inst = Struct::new(&outer);
    inst.nested_mut("inner").unwrap().set("x", 1u8).unwrap();

    let Value::Struct(mut copy) = inst.get("inner").unwrap() else {
        panic!("expected a struct value");
    };
    copy.set("x", 2u8).unwrap();

    assert_eq!(copy.get("x").unwrap(), Value::UInt(2));
    assert_eq!(inst.nested("inner").unwrap().get("x").unwrap(), Value::UInt(1));
}

#[test]
fn variable_retyping_reinterprets_bytes() {
    let ty = StructType::builder("V")
        .field("var", Field::variable())
        .field("end", Field::u8())
        .build()
        .unwrap();

    let mut inst = Struct::new(&ty);
    assert_eq!(inst.get("var").unwrap_err(), Error::NoTypeAssigned);

    inst.set("end", 7u8).unwrap();
    inst.resize("var", Field::string(2), true).unwrap();
    inst.set("var", "ab").unwrap();
    assert_eq!(inst.get("var").unwrap(), Value::Str("ab".into()));

    inst.resize("var", Field::string(4), true).unwrap();
    assert_eq!(inst.get("var").unwrap(), Value::Str("ab\0\0".into()));
    assert_eq!(inst.get("end").unwrap(), Value::UInt(7));
    assert_eq!(inst.data(), b"ab\0\0\x07");
}

#[test]
fn variable_holding_structs() {
    let inner = StructType::builder("Inner")
        .field("arr", Field::dyn_array(Field::string(2)))
        .build()
        .unwrap();
    let inner2 = StructType::builder("Inner2")
        .field("arr", Field::dyn_array(Field::string(4)))
        .build()
        .unwrap();
    let ty = StructType::builder("Struct")
        .field("variable", Field::variable().at(0))
        .build()
        .unwrap();

    let mut inst = Struct::new(&ty);
    inst.resize("variable", Field::nested(&inner), true).unwrap();
    inst.nested_mut("variable")
        .unwrap()
        .set("arr", Value::array(["aa", "bb", "cc", "dd"]))
        .unwrap();
    assert_eq!(inst.data().len(), 8);
    assert_eq!(
        inst.nested("variable").unwrap().array("arr").unwrap().to_dense().unwrap(),
        ["aa", "bb", "cc", "dd"].into_iter().collect::<DenseArray>()
    );

    inst.resize("variable", Field::string(8), false).unwrap();
    assert_eq!(inst.get("variable").unwrap(), Value::Str("aabbccdd".into()));

    inst.resize("variable", Field::nested(&inner2), false).unwrap();
    {
        let mut nested = inst.nested_mut("variable").unwrap();
        nested.resize("arr", 2usize, false).unwrap();
        nested.resize("arr", 4usize, true).unwrap();
    }

    let arr = inst.nested("variable").unwrap().array("arr").unwrap();
    assert_eq!(arr.get(&[0]).unwrap(), Value::Str("aabb".into()));
    assert_eq!(arr.get(&[1]).unwrap(), Value::Str("ccdd".into()));
    assert_eq!(inst.data().len(), 16);
}

#[test]
fn wrong_accessor_for_kind() {
    let ty = StructType::builder("T")
        .field("n", Field::u8())
        .build()
        .unwrap();
    let inst = Struct::new(&ty);

    let err = inst.nested("n").unwrap_err();
    insta::assert_snapshot!(err, @"expected a struct field, found u8");
    assert!(inst.array("n").is_err());
    assert!(inst.byte_range("n").is_err());
}
