/// Raised when a Python object is used after its contents were moved out of it
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("This {0} object is consumed and cannot be used!")]
pub struct Consumed(pub &'static str);

#[macro_export]
macro_rules! MakeConsumable {
    ($name:ident,$inner_type:tt,$obj_name:ident) => {
        pub(super) struct $name {
            obj: Option<$inner_type>,
        }
        impl $name {
            pub(super) fn acquire(val: $inner_type) -> Self {
                Self { obj: Some(val) }
            }
            fn consumed() -> $crate::python_ffi::Consumed {
                $crate::python_ffi::Consumed(std::stringify!($obj_name))
            }
            pub(super) fn get_ref(&self) -> Result<&$inner_type, $crate::python_ffi::Consumed> {
                self.obj.as_ref().ok_or_else(Self::consumed)
            }
            pub(super) fn get_ref_mut(&mut self) -> Result<&mut $inner_type, $crate::python_ffi::Consumed> {
                self.obj.as_mut().ok_or_else(Self::consumed)
            }
            pub(super) fn release(&mut self) -> Result<$inner_type, $crate::python_ffi::Consumed> {
                self.obj.take().ok_or_else(Self::consumed)
            }
        }
    };
}

#[macro_export]
macro_rules! Impl_to_PyErr {
    (for $($t:ty),+) => {
        $(impl From<$t> for PyErr {
            fn from(err: $t) -> Self {
                pyo3::exceptions::PyValueError::new_err(format!("{}", err))
            }
        }
        )*
    }
}
