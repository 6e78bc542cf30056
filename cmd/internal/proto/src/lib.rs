pub mod metastore {
    tonic::include_proto!("metastore");
}

pub mod blockstore {
    tonic::include_proto!("blockstore");
}
