//! gRPC 协议定义
//!
//! 由 `proto/money_service.proto` 在构建时生成，供服务端和客户端共用。

pub mod money_service {
    tonic::include_proto!("money_service");
}
